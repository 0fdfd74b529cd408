use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::ui::MainWindow;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("download failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("could not store thumbnail: {0}")]
    Io(#[from] io::Error),
}

pub fn thumbnail_url(base: &str, item_code: &str) -> Option<String> {
    let base = base.trim().trim_end_matches('/');
    let code = item_code.trim();
    if base.is_empty() || code.is_empty() {
        return None;
    }
    Some(format!("{}/{}.jpg", base, code))
}

fn sanitize_filename(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            result.push(ch);
        } else {
            result.push('_');
        }
    }
    if result.is_empty() {
        "item".to_string()
    } else {
        result
    }
}

pub fn cache_file(dir: &Path, item_code: &str) -> PathBuf {
    dir.join(format!("{}.jpg", sanitize_filename(item_code.trim())))
}

/// Downloads `url` into the thumbnail cache unless it is already there.
pub fn fetch(url: &str, dest: &Path) -> Result<PathBuf, ThumbnailError> {
    if dest.is_file() {
        return Ok(dest.to_path_buf());
    }
    let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ThumbnailError::Status(status.as_u16()));
    }
    let bytes = response.bytes()?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = dest.with_extension("part");
    fs::write(&partial, &bytes)?;
    fs::rename(&partial, dest)?;
    Ok(dest.to_path_buf())
}

/// Fetches the thumbnail in the background and shows it if the detail panel
/// still belongs to `item_code` by the time it arrives.
pub fn spawn_fetch(
    ui_handle: slint::Weak<MainWindow>,
    base_url: &str,
    cache_dir: &Path,
    item_code: &str,
) {
    let Some(url) = thumbnail_url(base_url, item_code) else {
        return;
    };
    let dest = cache_file(cache_dir, item_code);
    let code = item_code.to_string();

    let spawned = thread::Builder::new()
        .name("thumbnail".to_string())
        .spawn(move || match fetch(&url, &dest) {
            Ok(path) => {
                let posted = ui_handle.upgrade_in_event_loop(move |ui| {
                    if !ui.get_show_detail() || ui.get_detail().code.as_str() != code {
                        return;
                    }
                    match slint::Image::load_from_path(&path) {
                        Ok(image) => {
                            ui.set_detail_image(image);
                            ui.set_detail_has_image(true);
                        }
                        Err(_) => log::warn!("Could not decode thumbnail {}", path.display()),
                    }
                });
                if posted.is_err() {
                    log::debug!("Window closed before thumbnail arrived");
                }
            }
            Err(e) => log::warn!("No thumbnail from {}: {}", url, e),
        });
    if let Err(e) = spawned {
        log::warn!("Could not start thumbnail download: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_needs_base_and_code() {
        assert_eq!(
            thumbnail_url("https://cdn.example.com/thumbs/", "HW-100"),
            Some("https://cdn.example.com/thumbs/HW-100.jpg".to_string())
        );
        assert_eq!(thumbnail_url("https://cdn.example.com", "  "), None);
        assert_eq!(thumbnail_url("", "HW-100"), None);
    }

    #[test]
    fn cache_names_are_filesystem_safe() {
        let dir = Path::new("/tmp/thumbs");
        assert_eq!(cache_file(dir, "HW/100 a"), dir.join("HW_100_a.jpg"));
        assert_eq!(cache_file(dir, "../x"), dir.join("___x.jpg"));
    }

    #[test]
    fn cached_file_is_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let dest = cache_file(dir.path(), "A1");
        fs::write(&dest, b"jpeg").unwrap();
        let got = fetch("http://invalid.invalid/A1.jpg", &dest).unwrap();
        assert_eq!(got, dest);
    }
}
