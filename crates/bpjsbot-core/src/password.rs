//! Password hashing in werkzeug's `<method>$<salt>$<hex>` format.
//!
//! New hashes use `pbkdf2:sha256:<iterations>`. Verification also accepts
//! `scrypt:<n>:<r>:<p>`, the werkzeug 3 default, so accounts created by
//! any werkzeug-based tool keep working.

use pbkdf2::pbkdf2_hmac;
use scrypt::Params as ScryptParams;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use tracing::debug;

/// Iteration count used for new hashes (the werkzeug 2.3 pbkdf2 default).
pub const DEFAULT_ITERATIONS: u32 = 600_000;

const SALT_LENGTH: usize = 16;
const DIGEST_LEN: usize = 32;
/// Length of scrypt digests written by werkzeug.
const SCRYPT_DIGEST_LEN: usize = 64;

/// Hash a password with a fresh random salt.
pub fn generate_password_hash(password: &str) -> String {
    hash_with_iterations(password, DEFAULT_ITERATIONS)
}

/// Hash a password with an explicit iteration count.
pub fn hash_with_iterations(password: &str, iterations: u32) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();
    let digest = derive(password, &salt, iterations);
    format!("pbkdf2:sha256:{}${}${}", iterations, salt, hex::encode(digest))
}

/// Key derivation named by the method part of a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Pbkdf2Sha256 { iterations: u32 },
    Scrypt { log_n: u8, r: u32, p: u32 },
}

/// Check a password against a stored hash. Unknown formats never match.
pub fn check_password_hash(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (method, salt, expected) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(s), Some(h)) => (m, s, h),
        _ => return false,
    };

    let parsed = match parse_method(method) {
        Some(m) => m,
        None => {
            debug!("Unsupported password hash method: {}", method);
            return false;
        }
    };

    let expected = match hex::decode(expected) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    match parsed {
        Method::Pbkdf2Sha256 { iterations } => {
            constant_time_eq(&derive(password, salt, iterations), &expected)
        }
        Method::Scrypt { log_n, r, p } => match derive_scrypt(password, salt, log_n, r, p) {
            Some(digest) => constant_time_eq(&digest, &expected),
            None => false,
        },
    }
}

/// Parse `pbkdf2[:sha256[:iterations]]` or `scrypt[:n:r:p]`.
fn parse_method(method: &str) -> Option<Method> {
    let mut parts = method.split(':');
    match parts.next()? {
        "pbkdf2" => {
            if parts.next().unwrap_or("sha256") != "sha256" {
                return None;
            }
            let iterations = match parts.next() {
                Some(iters) => iters.parse().ok()?,
                None => DEFAULT_ITERATIONS,
            };
            if parts.next().is_some() {
                return None;
            }
            Some(Method::Pbkdf2Sha256 { iterations })
        }
        "scrypt" => {
            let args: Vec<&str> = parts.collect();
            let (n, r, p) = match args.as_slice() {
                [] => (1u64 << 15, 8, 1),
                [n, r, p] => (n.parse().ok()?, r.parse().ok()?, p.parse().ok()?),
                _ => return None,
            };
            // The cost parameter is stored as N itself; it must be a power of two
            if n < 2 || !n.is_power_of_two() {
                return None;
            }
            let log_n = u8::try_from(n.trailing_zeros()).ok()?;
            Some(Method::Scrypt { log_n, r, p })
        }
        _ => None,
    }
}

fn derive_scrypt(password: &str, salt: &str, log_n: u8, r: u32, p: u32) -> Option<Vec<u8>> {
    let params = ScryptParams::new(log_n, r, p, SCRYPT_DIGEST_LEN).ok()?;
    let mut out = vec![0u8; SCRYPT_DIGEST_LEN];
    scrypt::scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut out).ok()?;
    Some(out)
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
