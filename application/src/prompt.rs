/// Retrieved texts, one per line, most similar first.
pub fn build_context<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer this question using the provided context.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Provide a clear, concise answer:"
    )
}
