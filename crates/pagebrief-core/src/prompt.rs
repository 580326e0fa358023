//! The fixed summarization instructions and their two wire renderings.

/// Cut `input` to at most `max_chars` characters on a char boundary
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// System instructions for a summary written in `locale`
pub fn instructions(locale: &str) -> String {
    format!(
        "You summarize web articles for a reader.\n\
         Rules:\n\
         - Answer with HTML structural markup only (<p>, <ul>, <li>, <strong>). \
         Never use Markdown syntax and never wrap the answer in a code block.\n\
         - Write in the reader's language ({locale}) as well as in the language of the article.\n\
         - Start with a short lead-in paragraph of one or two sentences.\n\
         - Follow with a bulleted list of the main topics. Begin every bullet with one \
         emoji or symbol that fits its topic.\n\
         - Do not write the words \"Summary\", \"Introduction\" or \"Conclusion\" as labels \
         or headings anywhere in the answer."
    )
}

/// Article text as sent to the model, title first when there is one
pub fn article_text(title: &str, content: &str, max_chars: usize) -> String {
    let content = truncate_chars(content, max_chars);
    let title = title.trim();
    if title.is_empty() {
        format!("Article:\n{content}")
    } else {
        format!("Title: {title}\n\nArticle:\n{content}")
    }
}

/// Instructions and article joined into one blob, for providers without roles
pub fn single_document(locale: &str, title: &str, content: &str, max_chars: usize) -> String {
    format!(
        "{}\n\n{}",
        instructions(locale),
        article_text(title, content, max_chars)
    )
}
