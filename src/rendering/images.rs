//! Image source resolution and loading for `<img>` elements.
//!
//! Sources may be `data:` URLs (how the profile photo is stored), local
//! files resolved against the document's base URL, or http(s) URLs. Remote
//! sources from another origin are only fetched when cross-origin capture is
//! enabled; anything that fails to load is skipped and painted as empty.

use crate::{Error, Result};
use base64::Engine as _;
use image::RgbaImage;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Data(Vec<u8>),
    File(PathBuf),
    Remote(Url),
}

/// Resolve `src` against `base`. Returns `None` for unsupported sources.
pub fn resolve(src: &str, base: Option<&Url>) -> Option<ImageSource> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("data:") {
        let (meta, payload) = rest.split_once(',')?;
        if !meta.ends_with(";base64") {
            return None;
        }
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        return base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .ok()
            .map(ImageSource::Data);
    }
    let url = match Url::parse(src) {
        Ok(url) => url,
        Err(_) => match base {
            Some(base) => base.join(src).ok()?,
            None => return Some(ImageSource::File(PathBuf::from(src))),
        },
    };
    match url.scheme() {
        "file" => url.to_file_path().ok().map(ImageSource::File),
        "http" | "https" => Some(ImageSource::Remote(url)),
        _ => None,
    }
}

fn is_cross_origin(url: &Url, base: Option<&Url>) -> bool {
    match base {
        Some(base) => base.origin() != url.origin(),
        None => true,
    }
}

fn load_one(source: ImageSource) -> Result<RgbaImage> {
    let bytes = match source {
        ImageSource::Data(bytes) => bytes,
        ImageSource::File(path) => std::fs::read(&path)
            .map_err(|e| Error::ImageError(format!("{}: {}", path.display(), e)))?,
        ImageSource::Remote(url) => fetch_remote(&url)?,
    };
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(feature = "remote-images")]
fn fetch_remote(url: &Url) -> Result<Vec<u8>> {
    let resp = reqwest::blocking::get(url.as_str())
        .map_err(|e| Error::ImageError(format!("Failed to fetch {}: {}", url, e)))?;
    if !resp.status().is_success() {
        return Err(Error::ImageError(format!("Failed to fetch {}: HTTP {}", url, resp.status())));
    }
    resp.bytes()
        .map(|b| b.to_vec())
        .map_err(|e| Error::ImageError(format!("Failed to read {}: {}", url, e)))
}

#[cfg(not(feature = "remote-images"))]
fn fetch_remote(url: &Url) -> Result<Vec<u8>> {
    Err(Error::ImageError(format!("remote images are disabled in this build: {}", url)))
}

/// Load every distinct source concurrently. Failures are logged and omitted.
pub async fn load_images(srcs: Vec<String>, base: Option<Url>, allow_cross_origin: bool, logging: bool) -> HashMap<String, RgbaImage> {
    let mut unique = srcs;
    unique.sort();
    unique.dedup();

    let mut jobs = Vec::new();
    for src in unique {
        let Some(source) = resolve(&src, base.as_ref()) else {
            if logging {
                debug!("unsupported image source skipped: {}", src);
            }
            continue;
        };
        if let ImageSource::Remote(url) = &source {
            if !allow_cross_origin && is_cross_origin(url, base.as_ref()) {
                if logging {
                    debug!("cross-origin image skipped: {}", url);
                }
                continue;
            }
        }
        jobs.push(async move {
            let loaded = tokio::task::spawn_blocking(move || load_one(source))
                .await
                .map_err(|e| Error::ImageError(e.to_string()))
                .and_then(|r| r);
            (src, loaded)
        });
    }

    let mut images = HashMap::new();
    for (src, loaded) in futures::future::join_all(jobs).await {
        match loaded {
            Ok(img) => {
                images.insert(src, img);
            }
            Err(e) => warn!("image {} not rendered: {}", truncate(&src, 64), e),
        }
    }
    images
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_sources() {
        let base = Url::parse("file:///tmp/site/index.html").expect("url");
        assert_eq!(
            resolve("img/me.png", Some(&base)),
            Some(ImageSource::File(PathBuf::from("/tmp/site/img/me.png")))
        );
        assert!(matches!(resolve("https://cdn.example/x.png", Some(&base)), Some(ImageSource::Remote(_))));
        assert_eq!(resolve("data:image/png;base64,AAEC", None), Some(ImageSource::Data(vec![0, 1, 2])));
        assert_eq!(resolve("data:text/plain,hello", None), None);
        assert_eq!(resolve("  ", None), None);
    }

    #[test]
    fn cross_origin_is_relative_to_base() {
        let base = Url::parse("http://localhost:8080/preview").expect("url");
        let same = Url::parse("http://localhost:8080/photo.png").expect("url");
        let other = Url::parse("http://cdn.example/photo.png").expect("url");
        assert!(!is_cross_origin(&same, Some(&base)));
        assert!(is_cross_origin(&other, Some(&base)));
    }
}
