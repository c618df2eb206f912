//! Server-rendered translator page

const TEMPLATE: &str = include_str!("../../templates/index.html");
const OPTIONS_PLACEHOLDER: &str = "{{ language_options }}";

/// Human-readable name for a language code
pub fn language_name(code: &str) -> String {
    match code {
        "en" => "English".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "es" => "Spanish".to_string(),
        "ru" => "Russian".to_string(),
        "it" => "Italian".to_string(),
        "nl" => "Dutch".to_string(),
        "zh" => "Chinese".to_string(),
        other => other.to_uppercase(),
    }
}

/// Render the page with one `<option>` per language
pub fn render(languages: &[String]) -> String {
    let options: String = languages
        .iter()
        .map(|code| {
            format!(
                "<option value=\"{}\">{}</option>\n",
                escape(code),
                escape(&language_name(code))
            )
        })
        .collect();

    TEMPLATE.replace(OPTIONS_PLACEHOLDER, &options)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
