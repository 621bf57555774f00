//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use anyhow::{Context, Result};

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// 페이지 순서대로 반환하며, 텍스트가 없는 페이지도 빈 문자열로 자리를
/// 유지합니다 (page_id 가 실제 페이지 위치와 일치하도록).
pub fn extract_pages_from_pdf(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .context("Failed to extract text from PDF")?;

    if pages.iter().all(|p| p.trim().is_empty()) {
        tracing::warn!(
            "No text extracted from PDF ({} pages). It might be a scanned document.",
            pages.len()
        );
    }

    Ok(pages)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunk;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// 페이지마다 한 줄의 텍스트를 가진 PDF 생성
    fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
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

    #[test]
    fn test_extract_two_page_pdf() {
        let bytes = build_pdf(&["alpha beta gamma", "delta epsilon zeta"]);

        let pages = extract_pages_from_pdf(&bytes).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].split_whitespace().collect::<Vec<_>>(), ["alpha", "beta", "gamma"]);
        assert_eq!(pages[1].split_whitespace().collect::<Vec<_>>(), ["delta", "epsilon", "zeta"]);
    }

    #[test]
    fn test_pdf_pages_become_separate_page_ids() {
        let bytes = build_pdf(&["alpha beta gamma", "delta epsilon zeta"]);
        let pages = extract_pages_from_pdf(&bytes).unwrap();

        let chunks = chunk("two.pdf", &pages, 500, 100).unwrap();
        let ids: Vec<(usize, &str)> = chunks
            .iter()
            .map(|c| (c.page_id, c.chunk_id.as_str()))
            .collect();
        assert_eq!(ids, vec![(0, "0_0"), (1, "1_0")]);
        assert_eq!(chunks[0].text, "alpha beta gamma");
        assert_eq!(chunks[1].text, "delta epsilon zeta");
    }
}
