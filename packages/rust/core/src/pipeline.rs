//! End-to-end packet pipeline: order → cover (→ scan code) → merge → artifact.
//!
//! One logical asynchronous task per invocation; no parallel workers, no
//! shared state between invocations. Only cover composition and container
//! assembly are fatal: a scan code failure degrades to a cover without
//! the image, and per-document failures are absorbed inside the merge
//! engine as inline error pages.

use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use orderpack_fetch::DocumentStore;
use orderpack_merge::{DocumentReport, PageHeader};
use orderpack_shared::{
    CompositionOptions, Order, PipelineConfig, ProgressReporter, Result,
};

/// MIME tag the finished artifact is wrapped with for transport.
pub const ARTIFACT_MIME: &str = "application/pdf";

// ---------------------------------------------------------------------------
// MergedArtifact
// ---------------------------------------------------------------------------

/// The pipeline's sole output: the finished packet plus generation
/// metadata for logging and the CLI summary.
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    /// Serialized packet, ready for download or print.
    pub bytes: Vec<u8>,
    /// Fixed binary MIME tag ([`ARTIFACT_MIME`]).
    pub mime: &'static str,
    /// Total pages in the packet.
    pub page_count: usize,
    /// Pages contributed by the cover.
    pub cover_pages: usize,
    /// Per-document outcomes, in input order.
    pub documents: Vec<DocumentReport>,
    /// SHA-256 of `bytes`.
    pub sha256: String,
    /// Wall-clock generation time.
    pub elapsed: Duration,
}

impl MergedArtifact {
    /// Number of documents replaced by error pages.
    pub fn failed_documents(&self) -> usize {
        self.documents.iter().filter(|r| !r.is_merged()).count()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full packet pipeline for one order.
///
/// 1. Scan code (optional, failure absorbed)
/// 2. Cover composition (fatal on failure)
/// 3. Document merge (per-document failures isolated)
/// 4. Wrap bytes with MIME tag, hash, and timing
#[instrument(skip_all, fields(order_id = %order.id, order_number = %order.display_number()))]
pub async fn generate(
    order: &Order,
    options: &CompositionOptions,
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<MergedArtifact> {
    let start = Instant::now();

    info!(
        documents = order.documents.len(),
        include_documents = options.include_documents,
        include_components = options.include_components,
        include_code = options.include_code,
        "starting packet pipeline"
    );

    // --- Phase 1: scan code ---
    let code_image = if options.include_code {
        progress.phase("Generating scan code");
        match orderpack_code::encode_order_link(&config.origin, order.display_number()) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "code unavailable, composing cover without it");
                None
            }
        }
    } else {
        None
    };

    // --- Phase 2: cover ---
    progress.phase("Composing cover");
    let cover = orderpack_cover::compose(order, options, code_image.as_ref())?;

    // --- Phase 3: merge ---
    progress.phase("Merging documents");
    let store = DocumentStore::new(config.store_url.clone(), config.timeout_secs)?;
    let header = PageHeader::for_order(order);
    let merged = orderpack_merge::merge(
        &cover.bytes,
        &header,
        &order.documents,
        &store,
        options,
        progress,
    )
    .await?;

    // --- Phase 4: wrap ---
    let sha256 = {
        let mut hasher = Sha256::new();
        hasher.update(&merged.bytes);
        format!("{:x}", hasher.finalize())
    };

    let artifact = MergedArtifact {
        bytes: merged.bytes,
        mime: ARTIFACT_MIME,
        page_count: merged.page_count,
        cover_pages: merged.cover_pages,
        documents: merged.documents,
        sha256,
        elapsed: start.elapsed(),
    };

    info!(
        page_count = artifact.page_count,
        cover_pages = artifact.cover_pages,
        failed_documents = artifact.failed_documents(),
        sha256 = %artifact.sha256,
        elapsed_ms = artifact.elapsed.as_millis(),
        "packet pipeline complete"
    );

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};
    use orderpack_shared::SilentProgress;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture_order() -> Order {
        let json = std::fs::read_to_string("../../../fixtures/json/order.fixture.json")
            .expect("read fixture");
        serde_json::from_str(&json).expect("deserialize fixture order")
    }

    fn config_for(server: &MockServer) -> PipelineConfig {
        PipelineConfig {
            origin: "https://werkstatt.example.com".into(),
            store_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 5,
            tool_version: "0.1.0-test".into(),
        }
    }

    /// A minimal n-page PDF for mock store responses.
    fn make_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids: Vec<Object> = Vec::new();
        for k in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("page {k}"))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    async fn mount_pdf(server: &MockServer, id: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/documents/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn generate_end_to_end_with_one_failure() {
        let order = fixture_order();
        let server = MockServer::start().await;
        mount_pdf(&server, "doc-r02", make_pdf(2)).await;
        // doc-survey is unreachable (no mock -> 404).
        mount_pdf(&server, "doc-offer", make_pdf(1)).await;

        let artifact = generate(
            &order,
            &CompositionOptions::default(),
            &config_for(&server),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(artifact.mime, ARTIFACT_MIME);
        // cover + 2 + 1 (error page) + 1
        assert_eq!(artifact.page_count, artifact.cover_pages + 4);
        assert_eq!(artifact.documents.len(), 3);
        assert!(artifact.documents[0].is_merged());
        assert!(!artifact.documents[1].is_merged());
        assert!(artifact.documents[2].is_merged());
        assert_eq!(artifact.failed_documents(), 1);
        assert_eq!(artifact.sha256.len(), 64);

        // The artifact is a valid PDF with the expected page total.
        let parsed = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), artifact.page_count);
    }

    #[tokio::test]
    async fn order_without_documents_yields_cover_only() {
        // include_documents is on, but nothing is attached.
        let mut order = fixture_order();
        order.documents.clear();
        let server = MockServer::start().await;

        let artifact = generate(
            &order,
            &CompositionOptions::default(),
            &config_for(&server),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(artifact.page_count, artifact.cover_pages);
        assert!(artifact.documents.is_empty());
    }

    #[tokio::test]
    async fn opt_out_skips_all_fetches() {
        let order = fixture_order();
        // No mocks mounted: any fetch would fail, so a cover-only result
        // proves nothing was requested.
        let server = MockServer::start().await;

        let mut options = CompositionOptions::default();
        options.include_documents = false;

        let artifact = generate(&order, &options, &config_for(&server), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(artifact.page_count, artifact.cover_pages);
        assert!(artifact.documents.is_empty());
    }

    #[tokio::test]
    async fn bad_origin_degrades_to_raw_payload_code() {
        let order = fixture_order();
        let server = MockServer::start().await;
        mount_pdf(&server, "doc-r02", make_pdf(1)).await;
        mount_pdf(&server, "doc-survey", make_pdf(1)).await;
        mount_pdf(&server, "doc-offer", make_pdf(1)).await;

        let mut config = config_for(&server);
        config.origin = "::::".into();

        // The malformed origin must not abort the pipeline.
        let artifact = generate(
            &order,
            &CompositionOptions::default(),
            &config,
            &SilentProgress,
        )
        .await
        .unwrap();
        assert_eq!(artifact.page_count, artifact.cover_pages + 3);
    }
}
