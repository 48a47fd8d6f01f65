use crate::compose::PageSlice;
use crate::config::ExportConfig;
use crate::error::TrimlineError;
use crate::types::{Pt, Size};
use lopdf::{
    Document as LoDocument, Object as LoObject, Stream as LoStream, StringFormat, dictionary,
};
use sha2::{Digest, Sha256};

/// Assemble the finished page slices into a single fixed-page-size PDF.
/// Every slice becomes one page: the payload is embedded once as a DCTDecode
/// image XObject and drawn at full page width, aspect preserved. The first
/// page sits flush against the top edge; later pages are offset by the
/// configured margin, matching the page definition the cuts were planned for.
pub fn assemble_pdf(
    pages: &[PageSlice],
    title: &str,
    config: &ExportConfig,
) -> Result<Vec<u8>, TrimlineError> {
    if pages.is_empty() {
        return Err(TrimlineError::InvalidConfiguration(
            "no pages to assemble".to_string(),
        ));
    }

    let page_size = Size::from_mm(config.page_width_mm, config.page_height_mm);
    let px_per_mm = pages[0].width_px as f32 / config.page_width_mm;

    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<LoObject> = Vec::with_capacity(pages.len());

    for (idx, slice) in pages.iter().enumerate() {
        let image_stream = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => slice.width_px as i32,
                "Height" => slice.height_px as i32,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            slice.jpeg.clone(),
        );
        let image_id = doc.add_object(image_stream);

        let image_name = format!("Im{idx}");
        let content = page_content(idx, slice, config, px_per_mm, &image_name);
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content.into_bytes()));

        let mut xobjects = lopdf::Dictionary::new();
        xobjects.set(image_name.as_bytes().to_vec(), LoObject::Reference(image_id));
        let mut resources = lopdf::Dictionary::new();
        resources.set("XObject", LoObject::Dictionary(xobjects));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page_size.width.to_f32().into(),
                page_size.height.to_f32().into(),
            ],
            "Resources" => LoObject::Dictionary(resources),
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i32;
    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        },
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => LoObject::string_literal(title),
        "Producer" => LoObject::string_literal(format!(
            "trimline {}",
            env!("CARGO_PKG_VERSION")
        )),
    });

    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    let id = document_id(pages, title);
    doc.trailer.set(
        "ID",
        LoObject::Array(vec![
            LoObject::String(id.clone(), StringFormat::Hexadecimal),
            LoObject::String(id, StringFormat::Hexadecimal),
        ]),
    );

    doc.renumber_objects();
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Content stream placing one page image. PDF user space has a bottom-left
/// origin, so the image lands at `page_height - top_margin - image_height`.
fn page_content(
    idx: usize,
    slice: &PageSlice,
    config: &ExportConfig,
    px_per_mm: f32,
    image_name: &str,
) -> String {
    let page_size = Size::from_mm(config.page_width_mm, config.page_height_mm);
    let top_margin = if idx == 0 {
        Pt::ZERO
    } else {
        Pt::from_mm(config.margin_mm)
    };
    let image_width = page_size.width;
    let image_height = Pt::from_mm(slice.height_px as f32 / px_per_mm);
    let y = (page_size.height - top_margin - image_height).max(Pt::ZERO);
    format!(
        "q {:.3} 0 0 {:.3} 0 {:.3} cm /{} Do Q\n",
        image_width.to_f32(),
        image_height.to_f32(),
        y.to_f32(),
        image_name
    )
}

/// Deterministic document identifier: SHA-256 over the title and every page
/// payload, truncated to the 16 bytes a PDF /ID slot carries.
fn document_id(pages: &[PageSlice], title: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    for page in pages {
        hasher.update(&page.jpeg);
    }
    hasher.finalize()[..16].to_vec()
}
