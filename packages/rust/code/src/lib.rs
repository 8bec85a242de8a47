//! Scan code generation for order covers.
//!
//! Encodes a canonical order-lookup URL as a two-tone QR raster. The raster
//! is a plain grayscale pixel buffer ([`CodeImage`]) so the cover composer
//! can embed it directly as a PDF image XObject without an image codec.
//!
//! Failure policy: if the URL path fails (malformed origin, encoder fault),
//! the raw payload is encoded instead with identical raster parameters.
//! Only a failure of that fallback surfaces as [`OrderpackError::CodeGeneration`],
//! which the orchestrator absorbs by proceeding without the image.

use qrcode::{Color, EcLevel, QrCode};
use tracing::{debug, warn};
use url::Url;

use orderpack_shared::{OrderpackError, Result};

/// Route template appended to the origin. The front end resolves
/// `#/order/<number>` to the order detail view, so this shape must not change.
const ORDER_ROUTE: &str = "/#/order/";

/// Target pixel width of the rendered code.
const TARGET_WIDTH_PX: u32 = 256;

/// Quiet-zone margin around the code, in modules.
const QUIET_ZONE_MODULES: u32 = 4;

/// Two-tone palette.
const DARK: u8 = 0x00;
const LIGHT: u8 = 0xFF;

// ---------------------------------------------------------------------------
// CodeImage
// ---------------------------------------------------------------------------

/// An 8-bit grayscale raster holding the rendered code.
#[derive(Debug, Clone)]
pub struct CodeImage {
    /// Row-major pixel data, one byte per pixel.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

// ---------------------------------------------------------------------------
// URL building
// ---------------------------------------------------------------------------

/// Build the canonical lookup URL for a code payload:
/// `{origin}/#/order/{payload}`.
///
/// The origin must parse as an http(s) URL; anything else is a primary-path
/// failure that [`encode_order_link`] recovers from.
pub fn order_url(origin: &str, payload: &str) -> Result<String> {
    let parsed = Url::parse(origin).map_err(|e| {
        OrderpackError::CodeGeneration(format!("invalid origin '{origin}': {e}"))
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(OrderpackError::CodeGeneration(format!(
            "unsupported origin scheme '{}'",
            parsed.scheme()
        )));
    }

    let trimmed = origin.trim_end_matches('/');
    Ok(format!("{trimmed}{ORDER_ROUTE}{payload}"))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode the lookup URL for `payload` as a scan code, falling back to the
/// raw payload when the URL path fails.
pub fn encode_order_link(origin: &str, payload: &str) -> Result<CodeImage> {
    match order_url(origin, payload).and_then(|url| encode_payload(&url)) {
        Ok(image) => Ok(image),
        Err(e) => {
            warn!(error = %e, payload, "URL encoding failed, falling back to raw payload");
            encode_payload(payload)
        }
    }
}

/// Encode an arbitrary string payload with the fixed raster parameters.
pub fn encode_payload(payload: &str) -> Result<CodeImage> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| OrderpackError::CodeGeneration(format!("encoder fault: {e}")))?;

    let image = render(&code);
    debug!(
        payload_len = payload.len(),
        width = image.width,
        "scan code rendered"
    );
    Ok(image)
}

/// Rasterize a QR matrix to the fixed target width with the quiet zone.
fn render(code: &QrCode) -> CodeImage {
    let modules = code.width() as u32;
    let total_modules = modules + 2 * QUIET_ZONE_MODULES;

    // Integer module scale; never below one pixel per module.
    let scale = (TARGET_WIDTH_PX / total_modules).max(1);
    let size = total_modules * scale;

    let colors = code.to_colors();
    let mut pixels = vec![LIGHT; (size * size) as usize];

    for my in 0..modules {
        for mx in 0..modules {
            if colors[(my * modules + mx) as usize] != Color::Dark {
                continue;
            }
            let x0 = (QUIET_ZONE_MODULES + mx) * scale;
            let y0 = (QUIET_ZONE_MODULES + my) * scale;
            for dy in 0..scale {
                let row = (y0 + dy) * size;
                for dx in 0..scale {
                    pixels[(row + x0 + dx) as usize] = DARK;
                }
            }
        }
    }

    CodeImage {
        pixels,
        width: size,
        height: size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_url_shape() {
        let url = order_url("https://werkstatt.example.com", "WO-2026-0042").unwrap();
        assert_eq!(url, "https://werkstatt.example.com/#/order/WO-2026-0042");

        // A trailing slash on the origin must not double up.
        let url = order_url("https://werkstatt.example.com/", "ord-9").unwrap();
        assert_eq!(url, "https://werkstatt.example.com/#/order/ord-9");
    }

    #[test]
    fn order_url_rejects_bad_origin() {
        assert!(order_url("not a url", "x").is_err());
        assert!(order_url("ftp://files.example.com", "x").is_err());
    }

    #[test]
    fn encode_produces_square_two_tone_raster() {
        let image = encode_payload("https://example.com/#/order/WO-1").unwrap();
        assert_eq!(image.width, image.height);
        assert_eq!(image.pixels.len(), (image.width * image.height) as usize);
        assert!(image.pixels.iter().all(|&p| p == DARK || p == LIGHT));
        // Near the configured target width, never wildly off.
        assert!(image.width >= TARGET_WIDTH_PX / 2);
    }

    #[test]
    fn quiet_zone_is_light() {
        let image = encode_payload("WO-2026-0042").unwrap();
        // The first rows fall entirely inside the quiet zone.
        let first_row = &image.pixels[..image.width as usize];
        assert!(first_row.iter().all(|&p| p == LIGHT));
        // So does the first column.
        assert!(
            (0..image.height)
                .all(|y| image.pixels[(y * image.width) as usize] == LIGHT)
        );
    }

    #[test]
    fn malformed_origin_falls_back_to_raw_payload() {
        let image = encode_order_link("::::", "WO-2026-0042").unwrap();
        assert!(image.width > 0);
    }
}
