//! `network` pack: fetch web pages and download files over HTTP(S)
//!
//! Local tools run on the blocking pool, so requests go through
//! `reqwest::blocking`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use super::{LocalProvider, ParamSpec, ParamType, ToolArgs, ToolOutput};

/// Characters of page text returned by `read_page`
const MAX_PAGE_CHARS: usize = 5000;

/// Links listed by `read_page`
const MAX_LINKS: usize = 15;

const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
const MAX_TIMEOUT_SECS: f64 = 600.0;

const USER_AGENT: &str = concat!("lynexus/", env!("CARGO_PKG_VERSION"));

pub fn pack() -> LocalProvider {
    use ParamType::String as Str;

    LocalProvider::new("builtin:network")
        .function(
            "read_page",
            "Fetch a web page and return its visible text and the links it contains.",
            vec![
                ParamSpec::required("url", Str).describe("http:// or https:// URL"),
                ParamSpec::optional("timeout", ParamType::Number).describe("Seconds, defaults to 30"),
                ParamSpec::optional("include_links", ParamType::Boolean).describe("Defaults to true"),
            ],
            read_page,
        )
        .function(
            "download_document",
            "Download a URL to a local file, creating missing parent directories.",
            vec![
                ParamSpec::required("url", Str),
                ParamSpec::required("save_path", Str),
            ],
            download_document,
        )
}

fn read_page(args: ToolArgs) -> ToolOutput {
    let url = parse_url(args.str("url")?)?;
    let timeout = match args.get("timeout") {
        Some(_) => args.f64("timeout")?,
        None => DEFAULT_TIMEOUT_SECS,
    };
    let include_links = match args.get("include_links") {
        Some(_) => args.bool("include_links")?,
        None => true,
    };
    if timeout.is_nan() || timeout <= 0.0 {
        return Err(format!("timeout must be positive, got {}", timeout).into());
    }
    let timeout = timeout.min(MAX_TIMEOUT_SECS);

    let html = client(timeout)?
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
        .send()?
        .error_for_status()?
        .text()?;

    let text = html_to_text(&html);
    let total = text.chars().count();

    let mut out = vec![format!("Page: {}", url), String::new()];
    out.push(text.chars().take(MAX_PAGE_CHARS).collect());
    if total > MAX_PAGE_CHARS {
        out.push(format!("...(truncated, {} characters in total)", total));
    }

    if include_links {
        let links = extract_links(&html, &url);
        out.push(String::new());
        if links.is_empty() {
            out.push("No links found".to_string());
        } else {
            out.push("Links:".to_string());
            for (i, link) in links.iter().take(MAX_LINKS).enumerate() {
                out.push(format!("{}. {}", i + 1, link));
            }
            if links.len() > MAX_LINKS {
                out.push(format!("...({} links, first {} shown)", links.len(), MAX_LINKS));
            }
        }
    }

    Ok(out.join("\n"))
}

fn download_document(args: ToolArgs) -> ToolOutput {
    let url = parse_url(args.str("url")?)?;
    let save_path = args.str("save_path")?.trim();
    if save_path.is_empty() {
        return Err("save_path must not be empty".into());
    }

    let bytes = client(DEFAULT_TIMEOUT_SECS)?
        .get(url)
        .send()?
        .error_for_status()?
        .bytes()?;
    if bytes.is_empty() {
        return Err("server returned an empty body".into());
    }

    if let Some(parent) = Path::new(save_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(save_path, &bytes)?;
    Ok(format!("Downloaded {} bytes to {}", bytes.len(), save_path))
}

fn client(timeout_secs: f64) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs_f64(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
}

/// Accept only absolute http(s) URLs with a host
fn parse_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(format!("URL must start with http:// or https://, got '{}'", raw)),
    }
}

/// Visible text of an HTML document: scripts, styles and tags removed,
/// common entities decoded, whitespace collapsed
fn html_to_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut text = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        text.push_str(&html[pos..start]);

        let skip_until = ["script", "style"].iter().find_map(|tag| {
            let open = format!("<{}", tag);
            lower[start..].starts_with(&open).then(|| format!("</{}", tag))
        });
        let end = match skip_until {
            Some(close) => lower[start..]
                .find(&close)
                .and_then(|i| lower[start + i..].find('>').map(|j| start + i + j + 1)),
            None => lower[start..].find('>').map(|i| start + i + 1),
        };

        match end {
            Some(end) => {
                text.push(' ');
                pos = end;
            }
            None => {
                pos = html.len();
            }
        }
    }
    if pos < html.len() {
        text.push_str(&html[pos..]);
    }

    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Absolute targets of `href` attributes, deduplicated and sorted
///
/// Fragment, `javascript:` and `mailto:` links are skipped; relative links
/// are resolved against `base`.
fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut links = Vec::new();
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find("href=") {
        let start = pos + offset + "href=".len();
        let rest = &html[start..];
        let (value, consumed) = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => match rest[1..].find(quote) {
                Some(end) => (&rest[1..end + 1], end + 2),
                None => break,
            },
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                (&rest[..end], end)
            }
        };
        pos = start + consumed.max(1).min(rest.len());

        let value = value.trim();
        let lowered = value.to_ascii_lowercase();
        if value.is_empty()
            || value.starts_with('#')
            || lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
        {
            continue;
        }
        if let Ok(link) = base.join(value) {
            let link = link.to_string();
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }

    links.sort();
    links
}
