use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::RgbaImage;
use resvg::{tiny_skia, usvg};
use serde::Deserialize;
use thiserror::Error;

use crate::settings::AppSettings;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("listing failed: {0}")]
    Listing(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// IMAGE SOURCE — resolves a remote listing to direct download URLs
// ============================================================================

pub trait ImageSource: Send + Sync {
    fn list_available_images(&self) -> Result<Vec<String>, FetchError>;
}

/// A fixed list of URLs.
pub struct StaticSource(pub Vec<String>);

impl ImageSource for StaticSource {
    fn list_available_images(&self) -> Result<Vec<String>, FetchError> {
        Ok(self.0.clone())
    }
}

/// One directory in a GitHub repository, listed through the contents API.
pub struct GithubDirectory {
    client: reqwest::blocking::Client,
    pub repo: String,
    pub path: String,
    pub git_ref: String,
}

/// Entry of a `GET /repos/{repo}/contents/{path}` response.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

impl GithubDirectory {
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        git_ref: impl Into<String>,
        client: reqwest::blocking::Client,
    ) -> Self {
        Self {
            client,
            repo: repo.into(),
            path: path.into(),
            git_ref: git_ref.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, FetchError> {
        let client = http_client(&settings.user_agent, settings.fetch_timeout())?;
        Ok(Self::new(
            settings.listing_repo.clone(),
            settings.listing_path.clone(),
            settings.listing_ref.clone(),
            client,
        ))
    }

    pub fn api_url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/contents/{}?ref={}",
            self.repo, self.path, self.git_ref
        )
    }

    /// Raw download URL for a file in the listed directory.
    pub fn raw_url(&self, name: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.repo, self.git_ref, self.path, name
        )
    }

    /// Direct URLs of every `.svg` file in a contents API response body.
    pub fn svg_urls(&self, body: &str) -> Result<Vec<String>, FetchError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return Err(FetchError::Listing(message.to_string()));
        }
        let entries: Vec<ContentEntry> = serde_json::from_value(value)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "file" && e.name.to_lowercase().ends_with(".svg"))
            .map(|e| e.download_url.unwrap_or_else(|| self.raw_url(&e.name)))
            .collect())
    }
}

impl ImageSource for GithubDirectory {
    fn list_available_images(&self) -> Result<Vec<String>, FetchError> {
        let url = self.api_url();
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        let urls = self.svg_urls(&body)?;
        crate::log_info!("Listed {} SVG files from {}/{}", urls.len(), self.repo, self.path);
        Ok(urls)
    }
}

// ============================================================================
// IMAGE FETCHER — URL → decoded bitmap
// ============================================================================

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError>;
}

/// Blocking HTTP fetcher.  Call it from a worker thread, never the UI thread.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, FetchError> {
        Ok(Self::new(http_client(&settings.user_agent, settings.fetch_timeout())?))
    }

    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let bytes = self.fetch_bytes(url)?;
        decode_image(&bytes)
    }
}

pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::blocking::Client, FetchError> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load from a local file.
pub fn load_image_file(path: &Path) -> Result<RgbaImage, FetchError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

// ============================================================================
// DECODING
// ============================================================================

/// `true` when the bytes look like XML/SVG text rather than a binary raster.
pub fn looks_like_svg(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

/// Decode SVG or any raster format the `image` crate knows into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, FetchError> {
    if looks_like_svg(bytes) {
        return decode_svg(bytes);
    }
    let format = image::guess_format(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    let img = image::load(Cursor::new(bytes), format).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(img.into_rgba8())
}

/// Largest width or height an SVG is rasterized at.
pub const MAX_SVG_SIDE: u32 = 4096;

/// Rasterize an SVG document at its intrinsic size.
pub fn decode_svg(bytes: &[u8]) -> Result<RgbaImage, FetchError> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opt).map_err(|e| FetchError::Decode(e.to_string()))?;
    let size = tree.size().to_int_size();
    if size.width() > MAX_SVG_SIDE || size.height() > MAX_SVG_SIDE {
        return Err(FetchError::Decode(format!(
            "SVG size {}x{} exceeds the {}px limit",
            size.width(),
            size.height(),
            MAX_SVG_SIDE
        )));
    }
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| FetchError::Decode(format!("bad SVG size {}x{}", size.width(), size.height())))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; egui and the color counter want straight alpha.
    let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(size.width(), size.height(), rgba)
        .ok_or_else(|| FetchError::Decode("pixel buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2">
        <rect x="0" y="0" width="4" height="2" fill="#ff0000"/>
    </svg>"##;

    fn github() -> GithubDirectory {
        GithubDirectory::new(
            "hfg-gmuend/openmoji",
            "src/symbols/geometric",
            "abc123",
            reqwest::blocking::Client::new(),
        )
    }

    #[test]
    fn listing_keeps_only_svg_files() {
        let body = r#"[
            {"name": "1F534.svg", "type": "file",
             "download_url": "https://raw.githubusercontent.com/x/y/abc123/1F534.svg"},
            {"name": "README.md", "type": "file", "download_url": "https://example.com/README.md"},
            {"name": "nested", "type": "dir", "download_url": null},
            {"name": "25A0.SVG", "type": "file", "download_url": null}
        ]"#;
        let urls = github().svg_urls(body).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://raw.githubusercontent.com/x/y/abc123/1F534.svg".to_string(),
                "https://raw.githubusercontent.com/hfg-gmuend/openmoji/abc123/src/symbols/geometric/25A0.SVG"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn listing_error_message_is_surfaced() {
        let err = github().svg_urls(r#"{"message": "API rate limit exceeded"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Listing(ref m) if m == "API rate limit exceeded"));
    }

    #[test]
    fn listing_garbage_is_a_json_error() {
        assert!(matches!(github().svg_urls("<html>"), Err(FetchError::Json(_))));
    }

    #[test]
    fn api_url_layout() {
        assert_eq!(
            github().api_url(),
            "https://api.github.com/repos/hfg-gmuend/openmoji/contents/src/symbols/geometric?ref=abc123"
        );
    }

    #[test]
    fn static_source_lists_its_urls() {
        let src = StaticSource(vec!["https://a/b.svg".to_string()]);
        assert_eq!(src.list_available_images().unwrap(), vec!["https://a/b.svg".to_string()]);
    }

    #[test]
    fn svg_sniffing() {
        assert!(looks_like_svg(b"  \n<svg/>"));
        assert!(looks_like_svg(b"\xEF\xBB\xBF<?xml version=\"1.0\"?>"));
        assert!(!looks_like_svg(b"\x89PNG\r\n"));
        assert!(!looks_like_svg(b""));
    }

    #[test]
    fn svg_is_rasterized_at_intrinsic_size() {
        let img = decode_image(RED_SVG.as_bytes()).unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn oversized_svg_is_rejected() {
        let huge = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40000" height="10"/>"#;
        match decode_image(huge.as_bytes()) {
            Err(FetchError::Decode(msg)) => assert!(msg.contains("40000x10"), "{}", msg),
            other => panic!("expected a decode error, got {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn png_bytes_decode() {
        let src = RgbaImage::from_pixel(3, 5, Rgba([1, 2, 3, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(src.clone())
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        assert_eq!(decode_image(buf.get_ref()).unwrap(), src);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_image(b"\x00\x01\x02 not an image"), Err(FetchError::Decode(_))));
        assert!(matches!(decode_image(b"<not really svg"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("geocanvas_io_test_{}.svg", std::process::id()));
        std::fs::write(&path, RED_SVG).unwrap();
        let img = load_image_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(img.dimensions(), (4, 2));

        assert!(matches!(
            load_image_file(Path::new("/definitely/not/here.svg")),
            Err(FetchError::Io(_))
        ));
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://raw.githubusercontent.com/a.svg"));
        assert!(is_url("http://localhost/a.png"));
        assert!(!is_url("icons/a.svg"));
    }
}
