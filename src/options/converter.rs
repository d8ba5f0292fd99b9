//! Converter-level options applied once per conversion.

use serde::{Deserialize, Serialize};

use super::{SetOp, SettingValue, OUTPUT_KEY};

/// Size of the output document pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    A8,
    A9,
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    B9,
    B10,
    C5E,
    Comm10E,
    DLE,
    Executive,
    Folio,
    Ledger,
    Legal,
    Letter,
    Tabloid,
}

impl PaperSize {
    /// Native name of the paper size.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSize::A0 => "A0",
            PaperSize::A1 => "A1",
            PaperSize::A2 => "A2",
            PaperSize::A3 => "A3",
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::A6 => "A6",
            PaperSize::A7 => "A7",
            PaperSize::A8 => "A8",
            PaperSize::A9 => "A9",
            PaperSize::B0 => "B0",
            PaperSize::B1 => "B1",
            PaperSize::B2 => "B2",
            PaperSize::B3 => "B3",
            PaperSize::B4 => "B4",
            PaperSize::B5 => "B5",
            PaperSize::B6 => "B6",
            PaperSize::B7 => "B7",
            PaperSize::B8 => "B8",
            PaperSize::B9 => "B9",
            PaperSize::B10 => "B10",
            PaperSize::C5E => "C5E",
            PaperSize::Comm10E => "Comm10E",
            PaperSize::DLE => "DLE",
            PaperSize::Executive => "Executive",
            PaperSize::Folio => "Folio",
            PaperSize::Ledger => "Ledger",
            PaperSize::Legal => "Legal",
            PaperSize::Letter => "Letter",
            PaperSize::Tabloid => "Tabloid",
        }
    }
}

/// Orientation of the output document pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Taller than wide.
    Portrait,
    /// Wider than tall.
    Landscape,
}

impl Orientation {
    /// Native name of the orientation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }
}

/// Color mode of the output document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colorspace {
    /// Full color output.
    Color,
    /// Grayscale output.
    Grayscale,
}

impl Colorspace {
    /// Native name of the color mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Colorspace::Color => "Color",
            Colorspace::Grayscale => "Grayscale",
        }
    }
}

/// Options applied to the whole output document.
///
/// `None` and empty values are the zero values: fields marked as
/// emit-if-non-zero are then left at the engine's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterOptions {
    /// Paper size of the output document.
    pub paper_size: Option<PaperSize>,

    /// Page width, e.g. `"4cm"`. Overrides the paper size when set.
    pub width: String,

    /// Page height, e.g. `"12in"`.
    pub height: String,

    /// Page orientation.
    pub orientation: Option<Orientation>,

    /// Color mode.
    pub colorspace: Option<Colorspace>,

    /// DPI of the output document.
    pub dpi: u64,

    /// Number added to all page numbers in headers, footers and TOCs.
    pub page_offset: i64,

    /// Copies of the converted documents in the output.
    pub copies: u64,

    /// Whether copies are collated.
    pub collate: bool,

    /// Title of the output document.
    pub title: String,

    /// Whether an outline is generated.
    pub generate_outline: bool,

    /// Maximum nesting depth of the outline.
    pub outline_depth: u64,

    /// Location to dump an XML representation of the outline.
    pub outline_dump_path: String,

    /// Whether lossless compression is used.
    pub use_compression: bool,

    /// Top margin, e.g. `"1cm"`.
    pub margin_top: String,

    /// Bottom margin.
    pub margin_bottom: String,

    /// Left margin.
    pub margin_left: String,

    /// Right margin.
    pub margin_right: String,

    /// Maximum DPI for images.
    #[serde(rename = "imageDPI")]
    pub image_dpi: u64,

    /// JPEG compression factor (0-100).
    pub image_quality: u64,

    /// Cookie jar file used when loading web objects.
    pub cookie_jar_path: String,
}

impl ConverterOptions {
    /// Create converter options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the paper size.
    pub fn with_paper_size(mut self, size: PaperSize) -> Self {
        self.paper_size = Some(size);
        self
    }

    /// Set an explicit page size, clearing the paper size.
    pub fn with_page_size(mut self, width: impl Into<String>, height: impl Into<String>) -> Self {
        self.paper_size = None;
        self.width = width.into();
        self.height = height.into();
        self
    }

    /// Set the orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Set the color mode.
    pub fn with_colorspace(mut self, colorspace: Colorspace) -> Self {
        self.colorspace = Some(colorspace);
        self
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set copies and collation.
    pub fn with_copies(mut self, copies: u64, collate: bool) -> Self {
        self.copies = copies;
        self.collate = collate;
        self
    }

    /// Set all four margins.
    pub fn with_margins(
        mut self,
        top: impl Into<String>,
        right: impl Into<String>,
        bottom: impl Into<String>,
        left: impl Into<String>,
    ) -> Self {
        self.margin_top = top.into();
        self.margin_right = right.into();
        self.margin_bottom = bottom.into();
        self.margin_left = left.into();
        self
    }

    /// Enable or disable the outline and set its depth.
    pub fn with_outline(mut self, generate: bool, depth: u64) -> Self {
        self.generate_outline = generate;
        self.outline_depth = depth;
        self
    }

    /// Native setting operations, ending with the output-buffer selector.
    pub fn ops(&self) -> Vec<SetOp<'_>> {
        let mut ops = self.field_ops();
        ops.push(Self::output_op());
        ops
    }

    /// Native setting operations for the configured fields only.
    pub(crate) fn field_ops(&self) -> Vec<SetOp<'_>> {
        use SettingValue::*;

        let name = |value: Option<&'static str>| Str(value.unwrap_or(""));

        vec![
            SetOp::non_zero("size.pageSize", name(self.paper_size.map(|p| p.as_str()))),
            SetOp::non_zero("size.width", Str(&self.width)),
            SetOp::non_zero("size.height", Str(&self.height)),
            SetOp::non_zero("orientation", name(self.orientation.map(|o| o.as_str()))),
            SetOp::non_zero("colorMode", name(self.colorspace.map(|c| c.as_str()))),
            SetOp::non_zero("dpi", Uint(self.dpi)),
            SetOp::always("pageOffset", Int(self.page_offset)),
            SetOp::non_zero("copies", Uint(self.copies)),
            SetOp::always("collate", Bool(self.collate)),
            SetOp::always("outline", Bool(self.generate_outline)),
            SetOp::non_zero("outlineDepth", Uint(self.outline_depth)),
            SetOp::always("dumpOutline", Str(&self.outline_dump_path)),
            SetOp::always("documentTitle", Str(&self.title)),
            SetOp::always("useCompression", Bool(self.use_compression)),
            SetOp::non_zero("margin.top", Str(&self.margin_top)),
            SetOp::non_zero("margin.bottom", Str(&self.margin_bottom)),
            SetOp::non_zero("margin.left", Str(&self.margin_left)),
            SetOp::non_zero("margin.right", Str(&self.margin_right)),
            SetOp::non_zero("imageDPI", Uint(self.image_dpi)),
            SetOp::non_zero("imageQuality", Uint(self.image_quality)),
            SetOp::always("load.cookieJar", Str(&self.cookie_jar_path)),
        ]
    }

    /// Empty `out` selects the in-memory output buffer instead of a file.
    pub(crate) fn output_op() -> SetOp<'static> {
        SetOp::always(OUTPUT_KEY, SettingValue::Str(""))
    }
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            paper_size: Some(PaperSize::A4),
            width: String::new(),
            height: String::new(),
            orientation: Some(Orientation::Portrait),
            colorspace: Some(Colorspace::Color),
            dpi: 96,
            page_offset: 0,
            copies: 1,
            collate: true,
            title: String::new(),
            generate_outline: true,
            outline_depth: 0,
            outline_dump_path: String::new(),
            use_compression: true,
            margin_top: String::new(),
            margin_bottom: String::new(),
            margin_left: "10mm".to_string(),
            margin_right: "10mm".to_string(),
            image_dpi: 600,
            image_quality: 100,
            cookie_jar_path: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::apply_ops;

    fn applied(options: &ConverterOptions) -> Vec<(String, String)> {
        let mut sink = Vec::new();
        apply_ops(&options.ops(), &mut sink).unwrap();
        sink
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_default_options() {
        let pairs = applied(&ConverterOptions::default());

        assert_eq!(value(&pairs, "size.pageSize"), Some("A4"));
        assert_eq!(value(&pairs, "orientation"), Some("Portrait"));
        assert_eq!(value(&pairs, "colorMode"), Some("Color"));
        assert_eq!(value(&pairs, "dpi"), Some("96"));
        assert_eq!(value(&pairs, "pageOffset"), Some("0"));
        assert_eq!(value(&pairs, "documentTitle"), Some(""));
        assert_eq!(value(&pairs, "margin.left"), Some("10mm"));
        assert_eq!(value(&pairs, "margin.top"), None);
        assert_eq!(value(&pairs, "outlineDepth"), None);
        assert_eq!(value(&pairs, "size.width"), None);
    }

    #[test]
    fn test_output_selector_is_last() {
        let pairs = applied(&ConverterOptions::default());
        assert_eq!(pairs.last(), Some(&(OUTPUT_KEY.to_string(), String::new())));
    }

    #[test]
    fn test_page_size_clears_paper_size() {
        let options = ConverterOptions::new().with_page_size("4cm", "12in");
        let pairs = applied(&options);
        assert_eq!(value(&pairs, "size.pageSize"), None);
        assert_eq!(value(&pairs, "size.width"), Some("4cm"));
        assert_eq!(value(&pairs, "size.height"), Some("12in"));
    }

    #[test]
    fn test_builder() {
        let options = ConverterOptions::new()
            .with_paper_size(PaperSize::Letter)
            .with_orientation(Orientation::Landscape)
            .with_colorspace(Colorspace::Grayscale)
            .with_title("Report")
            .with_copies(2, false)
            .with_margins("1cm", "2cm", "3cm", "4cm")
            .with_outline(true, 4);

        let pairs = applied(&options);
        assert_eq!(value(&pairs, "size.pageSize"), Some("Letter"));
        assert_eq!(value(&pairs, "orientation"), Some("Landscape"));
        assert_eq!(value(&pairs, "colorMode"), Some("Grayscale"));
        assert_eq!(value(&pairs, "documentTitle"), Some("Report"));
        assert_eq!(value(&pairs, "copies"), Some("2"));
        assert_eq!(value(&pairs, "collate"), Some("false"));
        assert_eq!(value(&pairs, "margin.right"), Some("2cm"));
        assert_eq!(value(&pairs, "outlineDepth"), Some("4"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: ConverterOptions = serde_json::from_str(
            r#"{"title": "google.com", "paperSize": "Letter", "imageDPI": 300}"#,
        )
        .unwrap();

        assert_eq!(options.title, "google.com");
        assert_eq!(options.paper_size, Some(PaperSize::Letter));
        assert_eq!(options.image_dpi, 300);
        assert_eq!(options.dpi, 96);
        assert!(options.collate);
    }
}
