//! Merge engine: concatenates cover pages and fetched documents into one
//! PDF container with per-document fault isolation.
//!
//! Documents are fetched and merged one at a time, strictly in list
//! order, so the final page ordering is deterministic and peak memory
//! stays at roughly one decoded document plus the growing container. A
//! document that fails to fetch or parse is replaced in place by exactly
//! one error page naming it and the captured error; the failure never
//! aborts the merge. Only failures of container assembly or
//! serialization itself are fatal.

mod error_page;
mod stamp;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument, warn};

use orderpack_fetch::DocumentStore;
use orderpack_shared::{
    CompositionOptions, DocumentDescriptor, Order, OrderpackError, ProgressReporter, Result,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Header line stamped onto every merged document page.
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub title: String,
    pub client_name: String,
    pub order_number: String,
}

impl PageHeader {
    /// Header fields taken from an order.
    pub fn for_order(order: &Order) -> Self {
        Self {
            title: order.title.clone(),
            client_name: order.client_name.clone(),
            order_number: order.display_number().to_string(),
        }
    }

    /// The rendered header line with the fixed delimiter.
    pub(crate) fn line(&self) -> String {
        format!("{} | {} | {}", self.title, self.client_name, self.order_number)
    }
}

/// Outcome of one document descriptor during the merge.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    /// All pages were stamped and appended.
    Merged { pages: usize },
    /// Fetch or parse failed; one error page was appended instead.
    Failed { error: String },
}

/// Per-descriptor report, in input order.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub id: String,
    pub name: String,
    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    /// Pages this descriptor contributed to the final container: its own
    /// page count on success, the single error page on failure.
    pub fn pages_contributed(&self) -> usize {
        match &self.outcome {
            DocumentOutcome::Merged { pages } => *pages,
            DocumentOutcome::Failed { .. } => 1,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Merged { .. })
    }
}

/// Result of a completed merge.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Serialized final container.
    pub bytes: Vec<u8>,
    /// Total pages in the container.
    pub page_count: usize,
    /// Pages contributed by the cover.
    pub cover_pages: usize,
    /// One report per input descriptor, in order.
    pub documents: Vec<DocumentReport>,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge the cover with the order's documents.
///
/// With `include_documents` off, or an empty document list, the cover
/// bytes are returned unchanged. Page ordering is guaranteed: cover pages
/// first, then one page group per descriptor in input order, original
/// page order preserved within each group.
#[instrument(skip_all, fields(documents = documents.len()))]
pub async fn merge(
    cover_bytes: &[u8],
    header: &PageHeader,
    documents: &[DocumentDescriptor],
    store: &DocumentStore,
    options: &CompositionOptions,
    progress: &dyn ProgressReporter,
) -> Result<MergeOutput> {
    let cover = Document::load_mem(cover_bytes)
        .map_err(|e| OrderpackError::merge(format!("cover bytes are not a valid PDF: {e}")))?;
    let cover_pages = cover.get_pages().len();

    if !options.include_documents || documents.is_empty() {
        debug!(cover_pages, "no documents to merge, returning cover unchanged");
        return Ok(MergeOutput {
            bytes: cover_bytes.to_vec(),
            page_count: cover_pages,
            cover_pages,
            documents: Vec::new(),
        });
    }

    let total = documents.len();
    let mut sources: Vec<Document> = Vec::with_capacity(total + 1);
    sources.push(cover);
    let mut reports: Vec<DocumentReport> = Vec::with_capacity(total);

    for (i, descriptor) in documents.iter().enumerate() {
        match prepare_document(store, descriptor, header).await {
            Ok((doc, pages)) => {
                debug!(document_id = %descriptor.id, pages, "document stamped");
                reports.push(DocumentReport {
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    outcome: DocumentOutcome::Merged { pages },
                });
                sources.push(doc);
            }
            Err(e) if e.is_document_local() => {
                warn!(
                    document_id = %descriptor.id,
                    error = %e,
                    "document failed, substituting error page"
                );
                sources.push(error_page::build(&descriptor.name, &e.to_string()));
                reports.push(DocumentReport {
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    outcome: DocumentOutcome::Failed {
                        error: e.to_string(),
                    },
                });
            }
            Err(e) => return Err(e),
        }
        progress.document_processed(&descriptor.name, i + 1, total);
    }

    let (bytes, page_count) = concatenate(sources)?;

    info!(
        page_count,
        cover_pages,
        merged = reports.iter().filter(|r| r.is_merged()).count(),
        failed = reports.iter().filter(|r| !r.is_merged()).count(),
        "merge complete"
    );

    Ok(MergeOutput {
        bytes,
        page_count,
        cover_pages,
        documents: reports,
    })
}

/// Fetch, parse, and stamp one document. All errors out of here are
/// document-local and handled by the caller's isolation path.
async fn prepare_document(
    store: &DocumentStore,
    descriptor: &DocumentDescriptor,
    header: &PageHeader,
) -> Result<(Document, usize)> {
    let bytes = store.fetch(&descriptor.id).await?;

    let mut doc = Document::load_mem(&bytes)
        .map_err(|e| OrderpackError::document_parse(&descriptor.name, e.to_string()))?;

    let pages = stamp::stamp_document(&mut doc, header)
        .map_err(|e| OrderpackError::document_parse(&descriptor.name, e))?;

    Ok((doc, pages))
}

// ---------------------------------------------------------------------------
// Container assembly
// ---------------------------------------------------------------------------

/// Concatenate the sources into one container, preserving source order
/// and page order within each source.
///
/// Object ids are renumbered per source, every page is re-parented under
/// a fresh Pages root, and inheritable page attributes (MediaBox, Rotate)
/// are materialized onto each page so nothing mis-inherits across source
/// boundaries. The first source's Catalog is kept (it carries the cover's
/// viewer metadata); its outline tree is dropped.
fn concatenate(sources: Vec<Document>) -> Result<(Vec<u8>, usize)> {
    let mut merged = Document::with_version("1.5");
    let mut max_id: u32 = 1;
    let mut page_entries: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut catalog_dict: Option<Dictionary> = None;

    for mut doc in sources {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let media_box = stamp::resolve_in_tree(&doc, page_id, b"MediaBox");
            let rotate = stamp::resolve_in_tree(&doc, page_id, b"Rotate");

            let Ok(dict) = doc.get_object(page_id).and_then(Object::as_dict) else {
                continue;
            };
            let mut dict = dict.clone();
            if !dict.has(b"MediaBox") {
                dict.set(
                    "MediaBox",
                    media_box.unwrap_or_else(|| {
                        let (w, h) = stamp::FALLBACK_PAGE;
                        Object::Array(vec![0.into(), 0.into(), w.into(), h.into()])
                    }),
                );
            }
            if !dict.has(b"Rotate") {
                if let Some(rotate) = rotate {
                    dict.set("Rotate", rotate);
                }
            }
            page_entries.push((page_id, dict));
        }

        for (object_id, object) in doc.objects {
            match dict_type(&object) {
                Some(b"Catalog") => {
                    if catalog_dict.is_none() {
                        catalog_dict = object.as_dict().ok().cloned();
                    }
                }
                // Pages nodes are rebuilt from scratch; outlines would
                // dangle after renumbering into a packet.
                Some(b"Pages") | Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }
    }

    if page_entries.is_empty() {
        return Err(OrderpackError::merge("no pages found in any source"));
    }
    let mut catalog = catalog_dict
        .ok_or_else(|| OrderpackError::merge("no catalog found in any source"))?;

    let pages_id: ObjectId = (max_id, 0);
    max_id += 1;
    let catalog_id: ObjectId = (max_id, 0);
    max_id += 1;

    let kids: Vec<Object> = page_entries
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let page_count = page_entries.len();

    for (page_id, mut dict) in page_entries {
        dict.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(page_id, Object::Dictionary(dict));
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    catalog.set("Pages", Object::Reference(pages_id));
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = max_id;
    merged.renumber_objects();
    merged.compress();

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| OrderpackError::merge(format!("container serialization failed: {e}")))?;

    Ok((bytes, page_count))
}

fn dict_type(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, content::Content, content::Operation};
    use orderpack_shared::SilentProgress;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -- fixtures ----------------------------------------------------------

    fn make_order(documents: Vec<DocumentDescriptor>) -> Order {
        serde_json::from_value::<Order>(serde_json::json!({
            "id": "ord-1",
            "orderNumber": "WO-1",
            "title": "Steel frame",
            "clientName": "ACME GmbH",
            "costCenter": "CC-7",
            "deadline": "2026-09-15",
            "priority": "medium",
            "status": "in_progress",
            "createdAt": "2026-08-01T08:00:00Z",
        }))
        .map(|mut order| {
            order.documents = documents;
            order
        })
        .unwrap()
    }

    fn descriptor(id: &str, name: &str) -> DocumentDescriptor {
        DocumentDescriptor {
            id: id.into(),
            name: name.into(),
        }
    }

    /// A small n-page PDF whose page k carries the text `"{marker} p{k}"`.
    fn make_pdf(marker: &str, pages: usize) -> Vec<u8> {
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
            let text = format!("{marker} p{k}");
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(text.as_str())],
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

    fn cover_for(order: &Order) -> Vec<u8> {
        orderpack_cover::compose(order, &CompositionOptions::default(), None)
            .unwrap()
            .bytes
    }

    fn store_for(server: &MockServer) -> DocumentStore {
        DocumentStore::new(Url::parse(&server.uri()).unwrap(), 5).unwrap()
    }

    fn page_text(bytes: &[u8], page: u32) -> String {
        Document::load_mem(bytes)
            .expect("merged bytes must parse")
            .extract_text(&[page])
            .expect("extract text")
    }

    async fn mount_pdf(server: &MockServer, id: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/documents/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    // -- tests -------------------------------------------------------------

    #[tokio::test]
    async fn opt_out_returns_cover_unchanged() {
        let order = make_order(vec![descriptor("doc-a", "A.pdf")]);
        let cover = cover_for(&order);
        let server = MockServer::start().await;

        let mut options = CompositionOptions::default();
        options.include_documents = false;

        let output = merge(
            &cover,
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &options,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(output.bytes, cover);
        assert!(output.documents.is_empty());
        assert_eq!(output.page_count, output.cover_pages);
    }

    #[tokio::test]
    async fn empty_document_list_returns_cover_unchanged() {
        let order = make_order(vec![]);
        let cover = cover_for(&order);
        let server = MockServer::start().await;

        let output = merge(
            &cover,
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &CompositionOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(output.bytes, cover);
        assert_eq!(output.page_count, output.cover_pages);
    }

    #[tokio::test]
    async fn merges_documents_in_order_with_stamps() {
        let order = make_order(vec![
            descriptor("doc-a", "Alpha.pdf"),
            descriptor("doc-c", "Gamma.pdf"),
        ]);
        let cover = cover_for(&order);

        let server = MockServer::start().await;
        mount_pdf(&server, "doc-a", make_pdf("alpha", 2)).await;
        mount_pdf(&server, "doc-c", make_pdf("gamma", 1)).await;

        let output = merge(
            &cover,
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &CompositionOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        let cover_pages = output.cover_pages as u32;
        assert_eq!(output.page_count, output.cover_pages + 3);

        // Original page order preserved within each group.
        let p1 = page_text(&output.bytes, cover_pages + 1);
        assert!(p1.contains("alpha p1"));
        let p2 = page_text(&output.bytes, cover_pages + 2);
        assert!(p2.contains("alpha p2"));
        let p3 = page_text(&output.bytes, cover_pages + 3);
        assert!(p3.contains("gamma p1"));

        // Every merged page carries the header stamp.
        for page in (cover_pages + 1)..=(cover_pages + 3) {
            let text = page_text(&output.bytes, page);
            assert!(
                text.contains("Steel frame | ACME GmbH | WO-1"),
                "page {page} missing header: {text}"
            );
        }

        assert_eq!(output.documents.len(), 2);
        assert!(output.documents.iter().all(|r| r.is_merged()));
    }

    #[tokio::test]
    async fn failing_document_is_isolated_in_place() {
        // Three documents; the middle one is unreachable.
        let order = make_order(vec![
            descriptor("doc-a", "Alpha.pdf"),
            descriptor("doc-b", "Beta.pdf"),
            descriptor("doc-c", "Gamma.pdf"),
        ]);
        let cover = cover_for(&order);

        let server = MockServer::start().await;
        mount_pdf(&server, "doc-a", make_pdf("alpha", 2)).await;
        Mock::given(method("GET"))
            .and(path("/documents/doc-b"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        mount_pdf(&server, "doc-c", make_pdf("gamma", 1)).await;

        let output = merge(
            &cover,
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &CompositionOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        // cover + 2 (Alpha) + 1 (error page) + 1 (Gamma)
        assert_eq!(output.page_count, output.cover_pages + 4);

        let cover_pages = output.cover_pages as u32;
        // The error page sits exactly where Beta would have been.
        let error_text = page_text(&output.bytes, cover_pages + 3);
        assert!(error_text.contains("Beta.pdf"), "got: {error_text}");
        assert!(error_text.contains("502"), "got: {error_text}");

        // Gamma still follows, unchanged in position.
        let after = page_text(&output.bytes, cover_pages + 4);
        assert!(after.contains("gamma p1"));

        assert_eq!(output.documents.len(), 3);
        assert!(output.documents[0].is_merged());
        assert!(!output.documents[1].is_merged());
        assert!(output.documents[2].is_merged());
        assert_eq!(output.documents[1].pages_contributed(), 1);
    }

    #[tokio::test]
    async fn unparseable_bytes_become_an_error_page() {
        let order = make_order(vec![descriptor("doc-x", "Broken.pdf")]);
        let cover = cover_for(&order);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/doc-x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"this is not a pdf".to_vec()),
            )
            .mount(&server)
            .await;

        let output = merge(
            &cover,
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &CompositionOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(output.page_count, output.cover_pages + 1);
        let text = page_text(&output.bytes, output.cover_pages as u32 + 1);
        assert!(text.contains("Broken.pdf"));
        match &output.documents[0].outcome {
            DocumentOutcome::Failed { error } => {
                assert!(error.contains("Broken.pdf"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_cover_is_fatal() {
        let server = MockServer::start().await;
        let order = make_order(vec![]);
        let err = merge(
            b"not a pdf at all",
            &PageHeader::for_order(&order),
            &order.documents,
            &store_for(&server),
            &CompositionOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrderpackError::Merge(_)));
    }
}
