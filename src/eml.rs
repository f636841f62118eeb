//! Extracts a plain-text body from .eml files.

use std::path::Path;

use anyhow::{Context, Result};
use mailparse::ParsedMail;

/// Read a .eml file and return its body as plain text.
///
/// Prefers the text/html part (stripped to plain text), falls back to
/// text/plain. School bulletins are almost always HTML-only.
pub fn parse_eml(path: &Path) -> Result<String> {
    let raw =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    body_text(&raw).with_context(|| format!("Failed to parse email at {}", path.display()))
}

/// Extract the body from raw .eml bytes.
pub fn body_text(raw: &[u8]) -> Result<String> {
    let parsed = mailparse::parse_mail(raw).context("Not a parseable email")?;

    let mut html = None;
    let mut plain = None;
    collect_bodies(&parsed, &mut html, &mut plain)?;

    if let Some(html) = html {
        return html_to_text(&html);
    }
    Ok(plain.unwrap_or_default())
}

/// Walk the MIME tree and keep the first text/html and text/plain leaf bodies.
fn collect_bodies(
    part: &ParsedMail,
    html: &mut Option<String>,
    plain: &mut Option<String>,
) -> Result<()> {
    if part.subparts.is_empty() {
        match part.ctype.mimetype.as_str() {
            "text/html" if html.is_none() => {
                *html = Some(part.get_body().context("Failed to decode text/html part")?);
            }
            "text/plain" if plain.is_none() => {
                *plain = Some(part.get_body().context("Failed to decode text/plain part")?);
            }
            _ => {}
        }
        return Ok(());
    }

    for sub in &part.subparts {
        collect_bodies(sub, html, plain)?;
    }
    Ok(())
}

fn html_to_text(html: &str) -> Result<String> {
    html2text::from_read(html.as_bytes(), 80)
        .map_err(|e| anyhow::anyhow!("Failed to strip HTML body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_single_part() {
        let eml = "From: pta@school.org\n\
                   Subject: Bulletin\n\
                   Content-Type: text/plain\n\
                   \n\
                   Science Fair on March 3 at 18:00.\n";
        let body = body_text(eml.as_bytes()).unwrap();
        assert_eq!(body.trim(), "Science Fair on March 3 at 18:00.");
    }

    #[test]
    fn html_preferred_over_plain() {
        let eml = "From: pta@school.org\n\
                   Subject: Bulletin\n\
                   Content-Type: multipart/alternative; boundary=\"sep\"\n\
                   \n\
                   --sep\n\
                   Content-Type: text/plain\n\
                   \n\
                   Plain fallback text\n\
                   --sep\n\
                   Content-Type: text/html\n\
                   \n\
                   <html><body><p>Hot Lunch orders close Friday.</p></body></html>\n\
                   --sep--\n";
        let body = body_text(eml.as_bytes()).unwrap();
        assert!(body.contains("Hot Lunch orders close Friday."));
        assert!(!body.contains("Plain fallback text"));
    }

    #[test]
    fn html_found_in_nested_multipart() {
        let eml = "From: pta@school.org\n\
                   Subject: Bulletin\n\
                   Content-Type: multipart/mixed; boundary=\"outer\"\n\
                   \n\
                   --outer\n\
                   Content-Type: multipart/alternative; boundary=\"inner\"\n\
                   \n\
                   --inner\n\
                   Content-Type: text/plain\n\
                   \n\
                   Plain fallback text\n\
                   --inner\n\
                   Content-Type: text/html\n\
                   \n\
                   <p>Spring Concert May 12</p>\n\
                   --inner--\n\
                   --outer--\n";
        let body = body_text(eml.as_bytes()).unwrap();
        assert!(body.contains("Spring Concert May 12"));
    }

    #[test]
    fn quoted_printable_is_decoded() {
        let eml = "From: pta@school.org\n\
                   Subject: Bulletin\n\
                   Content-Type: text/plain; charset=utf-8\n\
                   Content-Transfer-Encoding: quoted-printable\n\
                   \n\
                   Caf=C3=A9 night on Friday\n";
        let body = body_text(eml.as_bytes()).unwrap();
        assert!(body.contains("Café night on Friday"));
    }

    #[test]
    fn empty_message_gives_empty_body() {
        let eml = "From: pta@school.org\nSubject: Bulletin\n\n";
        let body = body_text(eml.as_bytes()).unwrap();
        assert_eq!(body.trim(), "");
    }
}
