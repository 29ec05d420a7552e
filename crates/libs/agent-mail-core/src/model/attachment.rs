//! Attachment Pipeline.
//!
//! Turns Markdown image references and explicit `attachment_paths[]` into
//! content-addressed files (or inline data URIs) referenced from the
//! message body. Images are transcoded to WebP and deduplicated by the
//! sha1 of their final bytes; non-image attachments are stored untouched,
//! keyed by the sha1 of their original bytes.
//!
//! # Example
//!
//! ```no_run
//! use agent_mail_core::model::attachment::AttachmentBmc;
//! use agent_mail_core::model::ModelManager;
//!
//! # async fn example(mm: &ModelManager) -> agent_mail_core::Result<()> {
//! let (body, descriptors) = AttachmentBmc::process_for_message(
//!     mm,
//!     "my-project",
//!     "hello ![diagram](diagram.png)",
//!     &[],
//!     "auto",
//!     None,
//!     None,
//!     true,
//! )?;
//! # Ok(())
//! # }
//! ```

use crate::model::ModelManager;
use crate::store::fs_store;
use crate::utils::{image_processing, markdown};
use crate::Result;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One processed attachment, as recorded in a message's
/// `attachments_json` column and frontmatter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachmentDescriptor {
    /// `"file"` or `"inline"`.
    pub kind: String,
    pub media_type: String,
    /// Repo-relative path, set for `kind = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `data:` URI, set for `kind = "inline"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
    pub bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub conversion_failed: bool,
}

pub struct AttachmentBmc;

impl AttachmentBmc {
    /// Processes every image reference in `body_md` plus every path in
    /// `attachment_paths`, returning the rewritten body (image refs
    /// pointed at their final form) and the ordered attachment
    /// descriptors.
    ///
    /// `effective_policy` resolution (per-call override > agent policy >
    /// server default) is the caller's responsibility; this function
    /// takes the already-resolved policy as `embed_policy`.
    #[allow(clippy::too_many_arguments)]
    pub fn process_for_message(
        mm: &ModelManager,
        project_slug: &str,
        body_md: &str,
        attachment_paths: &[String],
        embed_policy: &str,
        inline_max_bytes_override: Option<i64>,
        repo_root_override: Option<&std::path::Path>,
        convert_images: bool,
    ) -> Result<(String, Vec<AttachmentDescriptor>)> {
        let slug_root = fs_store::project_repo_root(&mm.repo_root, project_slug);
        let repo_root = repo_root_override.unwrap_or(&mm.repo_root);
        let inline_max_bytes = inline_max_bytes_override.unwrap_or(mm.app_config.images.inline_image_max_bytes);

        let mut descriptors = Vec::new();
        let mut body = body_md.to_string();

        for (_alt, url) in markdown::extract_image_refs(body_md) {
            let (raw, hint_media_type) = match Self::load_image_bytes(&url, repo_root) {
                Ok(v) => v,
                Err(_) => continue, // not a loadable local/data-uri image ref; leave untouched
            };

            let descriptor = Self::ingest_image(
                mm,
                &slug_root,
                &raw,
                &hint_media_type,
                embed_policy,
                inline_max_bytes,
                convert_images,
            )?;

            let replacement = match &descriptor {
                AttachmentDescriptor { kind, data_uri: Some(d), .. } if kind == "inline" => d.clone(),
                AttachmentDescriptor { path: Some(p), .. } => p.clone(),
                _ => url.clone(),
            };
            body = body.replacen(&url, &replacement, 1);
            descriptors.push(descriptor);
        }

        for path in attachment_paths {
            let full_path = Self::resolve_path(path, repo_root);
            let raw = std::fs::read(&full_path)?;
            let ext = full_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin")
                .to_lowercase();

            if image_processing::is_valid_image(&raw) {
                let media_type = Self::media_type_for_ext(&ext);
                let descriptor = Self::ingest_image(
                    mm,
                    &slug_root,
                    &raw,
                    media_type,
                    embed_policy,
                    inline_max_bytes,
                    convert_images,
                )?;
                descriptors.push(descriptor);
            } else {
                descriptors.push(Self::ingest_opaque_file(mm, &slug_root, &raw, &ext)?);
            }
        }

        Ok((body, descriptors))
    }

    /// Loads an image referenced from a message body: a `data:` URI is
    /// decoded inline; anything else is treated as a path relative to the
    /// repo root (or absolute).
    fn load_image_bytes(url: &str, repo_root: &std::path::Path) -> Result<(Vec<u8>, String)> {
        if url.starts_with("data:") {
            let (bytes, media_type) = image_processing::decode_data_uri(url)?;
            Ok((bytes, media_type))
        } else {
            let path = Self::resolve_path(url, repo_root);
            let bytes = std::fs::read(&path)?;
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("png")
                .to_lowercase();
            Ok((bytes, Self::media_type_for_ext(&ext).to_string()))
        }
    }

    fn resolve_path(path: &str, repo_root: &std::path::Path) -> std::path::PathBuf {
        let p = std::path::Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            repo_root.join(p)
        }
    }

    fn media_type_for_ext(ext: &str) -> &'static str {
        match ext {
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "png" => "image/png",
            "pdf" => "application/pdf",
            "txt" => "text/plain",
            "json" => "application/json",
            _ => "application/octet-stream",
        }
    }

    /// Transcodes (or, on failure, passes through) one image, content
    /// addresses it, writes it to the archive (deduplicating on an
    /// existing file), optionally retains the original, and applies the
    /// embedding policy.
    fn ingest_image(
        mm: &ModelManager,
        slug_root: &std::path::Path,
        raw: &[u8],
        hint_media_type: &str,
        embed_policy: &str,
        inline_max_bytes: i64,
        convert_images: bool,
    ) -> Result<AttachmentDescriptor> {
        let (final_bytes, media_type, conversion_failed) = if convert_images {
            match image_processing::transcode_to_webp(raw, mm.app_config.images.webp_quality) {
                Ok(webp_bytes) => (webp_bytes, "image/webp".to_string(), false),
                Err(_) => (raw.to_vec(), hint_media_type.to_string(), true),
            }
        } else {
            (raw.to_vec(), hint_media_type.to_string(), false)
        };

        let sha1 = fs_store::sha1_hex(&final_bytes);
        let ext = if media_type == "image/webp" { "webp" } else { Self::ext_for_media_type(&media_type) };
        let stored_path = fs_store::attachment_path(slug_root, &sha1, ext);

        if !stored_path.exists() {
            fs_store::atomic_write(&stored_path, &final_bytes)?;
        }

        if mm.app_config.images.keep_original_images && raw != final_bytes.as_slice() {
            let orig_ext = Self::ext_for_media_type(hint_media_type);
            let orig_path = fs_store::attachment_original_path(slug_root, &sha1, orig_ext);
            if !orig_path.exists() {
                fs_store::atomic_write(&orig_path, raw)?;
            }
        }

        let relative_path = stored_path
            .strip_prefix(&mm.repo_root)
            .unwrap_or(&stored_path)
            .to_string_lossy()
            .replace('\\', "/");

        let bytes = final_bytes.len() as i64;
        let inline = match embed_policy {
            "inline" => true,
            "file" => false,
            _ => bytes <= inline_max_bytes,
        };

        Ok(if inline {
            let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &final_bytes);
            AttachmentDescriptor {
                kind: "inline".to_string(),
                media_type,
                path: None,
                data_uri: Some(format!("data:{};base64,{}", if conversion_failed { hint_media_type } else { "image/webp" }, b64)),
                bytes,
                sha1: Some(sha1),
                conversion_failed,
            }
        } else {
            AttachmentDescriptor {
                kind: "file".to_string(),
                media_type,
                path: Some(relative_path),
                data_uri: None,
                bytes,
                sha1: Some(sha1),
                conversion_failed,
            }
        })
    }

    fn ingest_opaque_file(
        mm: &ModelManager,
        slug_root: &std::path::Path,
        raw: &[u8],
        ext: &str,
    ) -> Result<AttachmentDescriptor> {
        let sha1 = fs_store::sha1_hex(raw);
        let stored_path = fs_store::attachment_path(slug_root, &sha1, ext);
        if !stored_path.exists() {
            fs_store::atomic_write(&stored_path, raw)?;
        }
        let relative_path = stored_path
            .strip_prefix(&mm.repo_root)
            .unwrap_or(&stored_path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(AttachmentDescriptor {
            kind: "file".to_string(),
            media_type: Self::media_type_for_ext(ext).to_string(),
            path: Some(relative_path),
            data_uri: None,
            bytes: raw.len() as i64,
            sha1: Some(sha1),
            conversion_failed: false,
        })
    }

    fn ext_for_media_type(media_type: &str) -> &'static str {
        match media_type {
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_guess_covers_common_extensions() {
        assert_eq!(AttachmentBmc::media_type_for_ext("jpg"), "image/jpeg");
        assert_eq!(AttachmentBmc::media_type_for_ext("png"), "image/png");
        assert_eq!(AttachmentBmc::media_type_for_ext("weird"), "application/octet-stream");
    }

    #[test]
    fn ext_for_media_type_round_trips_common_types() {
        assert_eq!(AttachmentBmc::ext_for_media_type("image/jpeg"), "jpg");
        assert_eq!(AttachmentBmc::ext_for_media_type("image/webp"), "webp");
    }
}
