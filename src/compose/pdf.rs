//! Serialise a laid-out [`Document`] to PDF bytes with lopdf.
//!
//! Output is PDF 1.7 with one shared resource dictionary: the six base-14
//! fonts (WinAnsi encoded, never embedded) plus one image XObject per
//! distinct raster. Streams are Flate-compressed on save.

use super::canvas::{Color, Document, DrawOp, RasterImage};
use super::fonts::{FontRegistry, FontRole};
use crate::error::AssignmentError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, Stream, StringFormat};
use std::collections::HashMap;
use std::sync::Arc;

const PRODUCER: &str = concat!("edgequake-assignment ", env!("CARGO_PKG_VERSION"));

pub(crate) fn lopdf_err(err: lopdf::Error) -> AssignmentError {
    AssignmentError::InternalComposition(format!("pdf: {err}"))
}

/// Write `doc` as a standalone PDF.
pub fn write_pdf(doc: &Document, fonts: &FontRegistry) -> Result<Vec<u8>, AssignmentError> {
    let mut out = LoDocument::with_version("1.7");
    let pages_id = out.new_object_id();

    let mut font_dict = Dictionary::new();
    for role in FontRole::ALL {
        let face = fonts.face(role);
        let id = out.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font,
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(face.resource, id);
    }

    // One XObject per distinct raster, keyed by allocation.
    let mut image_names: HashMap<*const RasterImage, String> = HashMap::new();
    let mut xobjects = Dictionary::new();
    for op in doc.pages.iter().flat_map(|p| p.ops.iter()) {
        if let DrawOp::Image { image, .. } = op {
            let key = Arc::as_ptr(image);
            if image_names.contains_key(&key) {
                continue;
            }
            let name = format!("Im{}", image_names.len() + 1);
            let id = out.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                image.rgb.clone(),
            ));
            xobjects.set(name.as_bytes().to_vec(), id);
            image_names.insert(key, name);
        }
    }

    let mut resources = dictionary! { "Font" => font_dict };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }
    let resources_id = out.add_object(resources);

    let mut kids = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let mut operations = Vec::with_capacity(page.ops.len() * 4);
        for op in &page.ops {
            encode_op(op, fonts, &image_names, &mut operations);
        }
        let content = Content { operations }.encode().map_err(lopdf_err)?;
        let content_id = out.add_object(Stream::new(dictionary! {}, content));
        let page_id = out.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = out.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    out.trailer.set("Root", catalog_id);
    out.trailer.set("Info", info_id);
    out.compress();

    let mut bytes = Vec::new();
    out.save_to(&mut bytes)
        .map_err(|e| AssignmentError::InternalComposition(format!("pdf save: {e}")))?;
    Ok(bytes)
}

fn rgb(op: &str, c: Color) -> Operation {
    Operation::new(op, vec![c.r.into(), c.g.into(), c.b.into()])
}

fn encode_op(
    op: &DrawOp,
    fonts: &FontRegistry,
    images: &HashMap<*const RasterImage, String>,
    out: &mut Vec<Operation>,
) {
    match op {
        DrawOp::Text {
            x,
            y,
            size,
            role,
            color,
            text,
        } => {
            let resource = fonts.face(*role).resource;
            out.push(Operation::new("BT", vec![]));
            out.push(Operation::new(
                "Tf",
                vec![Object::Name(resource.as_bytes().to_vec()), (*size).into()],
            ));
            out.push(rgb("rg", *color));
            out.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
            out.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ));
            out.push(Operation::new("ET", vec![]));
        }
        DrawOp::Rule {
            from,
            to,
            thickness,
            color,
        } => {
            out.push(Operation::new("q", vec![]));
            out.push(rgb("RG", *color));
            out.push(Operation::new("w", vec![(*thickness).into()]));
            out.push(Operation::new("m", vec![from.0.into(), from.1.into()]));
            out.push(Operation::new("l", vec![to.0.into(), to.1.into()]));
            out.push(Operation::new("S", vec![]));
            out.push(Operation::new("Q", vec![]));
        }
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            out.push(Operation::new("q", vec![]));
            if let Some(c) = fill {
                out.push(rgb("rg", *c));
            }
            if let Some((c, w)) = stroke {
                out.push(rgb("RG", *c));
                out.push(Operation::new("w", vec![(*w).into()]));
            }
            out.push(Operation::new(
                "re",
                vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
            ));
            let paint = match (fill.is_some(), stroke.is_some()) {
                (true, true) => "B",
                (true, false) => "f",
                (false, true) => "S",
                (false, false) => "n",
            };
            out.push(Operation::new(paint, vec![]));
            out.push(Operation::new("Q", vec![]));
        }
        DrawOp::Image {
            x,
            y,
            width,
            height,
            image,
        } => {
            let Some(name) = images.get(&Arc::as_ptr(image)) else {
                return;
            };
            out.push(Operation::new("q", vec![]));
            out.push(Operation::new(
                "cm",
                vec![
                    (*width).into(),
                    0.into(),
                    0.into(),
                    (*height).into(),
                    (*x).into(),
                    (*y).into(),
                ],
            ));
            out.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
            out.push(Operation::new("Q", vec![]));
        }
    }
}

/// Encode text for a WinAnsi simple font. Characters outside the encoding
/// become `?`; control characters become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\t' | '\n' | '\r' => b' ',
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}
