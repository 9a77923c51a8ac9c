//! Prompt texts and fixed replies. Users are Indonesian speakers, so
//! every model-facing and user-facing text is Indonesian.

/// Reply to anything that is not a `/sql` or `/pdf` command.
pub const USAGE: &str = "Gunakan format perintah:\n/sql <pertanyaan>\n/pdf <pertanyaan>";

/// Reply when no document is indexed.
pub const PDF_UNAVAILABLE: &str = "Dokumen PDF tidak tersedia atau gagal dimuat.";

/// Reply when the document has nothing matching the question.
pub const PDF_NOT_FOUND: &str = "Tidak ditemukan informasi terkait.";

/// Sentence the rephrase step must answer with for empty results.
pub const NO_DATA: &str = "Mohon maaf kami tidak memiliki data tersebut untuk menjawab pertanyaan Anda.";

/// Excerpt length per page in the PDF prompt, in characters.
pub const PAGE_EXCERPT_CHARS: usize = 600;

/// Marker after which the model writes the query.
pub const SQL_QUERY_MARKER: &str = "SQLQuery:";

/// Generation stops here so the model never invents results.
pub const SQL_RESULT_STOP: &str = "\nSQLResult:";

/// Prefix of answers when the SQL pipeline fails.
pub fn sql_failure(error: &str) -> String {
    format!("Gagal menjawab dari database: {}", error)
}

/// Prefix of answers when the PDF pipeline cannot read the page index.
pub fn pdf_failure(error: &str) -> String {
    format!("Gagal menjawab dari dokumen: {}", error)
}

/// Prefix of answers when the PDF model call fails.
pub fn pdf_model_failure(error: &str) -> String {
    format!("[OpenRouter Error] {}", error)
}

/// System message of the query generation prompt.
pub fn sql_system(dialect: &str, table_info: &str) -> String {
    format!(
        "Kamu adalah pakar {}. Berdasarkan pertanyaan, buat query SQL valid. \
         Jangan pernah menghapus atau mengubah data.\n\nTabel: {}\n\nContoh:",
        dialect, table_info
    )
}

/// Human turn of a few-shot example, and of the real question.
pub fn sql_human_turn(input: &str) -> String {
    format!("{}\n{}", input, SQL_QUERY_MARKER)
}

/// Second pass: phrase the query result as an answer.
pub fn rephrase(question: &str, query: &str, result: &str) -> String {
    format!(
        "\nJawab pertanyaan berdasarkan hasil query berikut.\n\
         Jawaban harus pakai Bahasa Indonesia, tanpa penjelasan tambahan.\n\n\
         Pertanyaan: {}\nQuery SQL: {}\nHasil SQL: {}\n\n\
         Jika hasil kosong, balas: '{}'\n",
        question, query, result, NO_DATA
    )
}

/// Grounded question over document excerpts.
pub fn pdf_question(question: &str, excerpts: &str) -> String {
    format!(
        "Jawablah pertanyaan hanya berdasarkan informasi berikut. \
         Jangan menambahkan atau mengarang jawaban di luar teks ini.\n\n\
         Informasi:\n{}\n\n\
         Pertanyaan: {}\n\
         Jika informasi tidak ditemukan, cukup jawab: '{}'",
        excerpts, question, PDF_NOT_FOUND
    )
}

/// `[Page n]: excerpt`, cut to [`PAGE_EXCERPT_CHARS`] characters.
pub fn page_excerpt(page: i64, text: &str) -> String {
    let cut = match text.char_indices().nth(PAGE_EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    format!("[Page {}]: {}", page, cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_excerpt_cuts_on_chars() {
        let long = "é".repeat(700);
        let excerpt = page_excerpt(4, &long);
        assert!(excerpt.starts_with("[Page 4]: "));
        assert_eq!(excerpt.chars().count(), "[Page 4]: ".len() + PAGE_EXCERPT_CHARS);
        assert_eq!(page_excerpt(0, "pendek"), "[Page 0]: pendek");
    }

    #[test]
    fn test_rephrase_mentions_fallback() {
        let p = rephrase("berapa?", "SELECT 1", "[]");
        assert!(p.contains("Pertanyaan: berapa?\nQuery SQL: SELECT 1\nHasil SQL: []"));
        assert!(p.contains(NO_DATA));
    }

    #[test]
    fn test_sql_texts() {
        assert!(sql_system("SQLite", "CREATE TABLE t (a)").contains("Tabel: CREATE TABLE t (a)\n\nContoh:"));
        assert_eq!(sql_human_turn("jumlah keluhan"), "jumlah keluhan\nSQLQuery:");
        assert_eq!(sql_failure("x"), "Gagal menjawab dari database: x");
        assert_eq!(pdf_model_failure("x"), "[OpenRouter Error] x");
    }
}
