//! Per-document options.

use serde::{Deserialize, Serialize};

use super::{SetOp, SettingValue};

/// Action taken when a document fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    Abort,
    Ignore,
    Skip,
}

impl ErrorAction {
    /// Native name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorAction::Abort => "abort",
            ErrorAction::Ignore => "ignore",
            ErrorAction::Skip => "skip",
        }
    }
}

/// Table of contents settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Toc {
    /// Dotted lines between TOC items and page numbers.
    pub use_dotted_lines: bool,

    /// Caption of the table of contents.
    pub title: String,

    /// Links from the TOC to the content.
    pub generate_forward_links: bool,

    /// Links from the content back to the TOC.
    pub generate_back_links: bool,

    /// Indentation per nesting level, e.g. `"1em"`.
    pub indentation: String,

    /// Font scaling factor per nesting level.
    pub font_scale: f64,
}

impl Default for Toc {
    fn default() -> Self {
        Self {
            use_dotted_lines: true,
            title: "Table of Contents".to_string(),
            generate_forward_links: true,
            generate_back_links: true,
            indentation: "1em".to_string(),
            font_scale: 1.0,
        }
    }
}

/// Header or footer settings.
///
/// Content fields accept the engine's substitution variables such as
/// `[page]`, `[topage]`, `[title]` or `[date]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderFooter {
    /// System font name.
    pub font: String,

    /// Font size.
    pub font_size: u64,

    /// Left region content.
    pub content_left: String,

    /// Center region content.
    pub content_center: String,

    /// Right region content.
    pub content_right: String,

    /// Line separator between header/footer and content.
    pub display_separator: bool,

    /// Space between header/footer and content.
    pub spacing: f64,

    /// Location of an HTML document used instead of the content fields.
    pub custom_location: String,
}

impl Default for HeaderFooter {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 12,
            content_left: String::new(),
            content_center: String::new(),
            content_right: String::new(),
            display_separator: false,
            spacing: 0.0,
            custom_location: String::new(),
        }
    }
}

impl HeaderFooter {
    fn ops(&self, keys: &HeaderFooterKeys) -> [SetOp<'_>; 8] {
        use SettingValue::*;

        [
            SetOp::non_zero(keys.font_name, Str(&self.font)),
            SetOp::non_zero(keys.font_size, Uint(self.font_size)),
            SetOp::always(keys.left, Str(&self.content_left)),
            SetOp::always(keys.center, Str(&self.content_center)),
            SetOp::always(keys.right, Str(&self.content_right)),
            SetOp::always(keys.line, Bool(self.display_separator)),
            SetOp::always(keys.spacing, Float(self.spacing)),
            SetOp::always(keys.html_url, Str(&self.custom_location)),
        ]
    }
}

struct HeaderFooterKeys {
    font_name: &'static str,
    font_size: &'static str,
    left: &'static str,
    center: &'static str,
    right: &'static str,
    line: &'static str,
    spacing: &'static str,
    html_url: &'static str,
}

const HEADER_KEYS: HeaderFooterKeys = HeaderFooterKeys {
    font_name: "header.fontName",
    font_size: "header.fontSize",
    left: "header.left",
    center: "header.center",
    right: "header.right",
    line: "header.line",
    spacing: "header.spacing",
    html_url: "header.htmlUrl",
};

const FOOTER_KEYS: HeaderFooterKeys = HeaderFooterKeys {
    font_name: "footer.fontName",
    font_size: "footer.fontSize",
    left: "footer.left",
    center: "footer.center",
    right: "footer.right",
    line: "footer.line",
    spacing: "footer.spacing",
    html_url: "footer.htmlUrl",
};

/// Options applied to a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectOptions {
    /// Convert external links to external PDF links.
    pub use_external_links: bool,

    /// Convert internal links to PDF references.
    pub use_local_links: bool,

    /// Convert HTML forms to PDF forms.
    pub produce_forms: bool,

    /// Include document sections in outlines and TOCs.
    pub include_in_outline: bool,

    /// Count this document's pages for TOCs, headers and footers.
    pub count_pages: bool,

    /// Table of contents settings.
    pub toc: Toc,

    /// Header settings.
    pub header: HeaderFooter,

    /// Footer settings.
    pub footer: HeaderFooter,

    /// Username used when logging in to a website.
    pub username: String,

    /// Password used when logging in to a website.
    pub password: String,

    /// Milliseconds to wait after load before running JavaScript.
    pub javascript_delay: u64,

    /// Value `window.status` must reach before rendering.
    pub window_status: String,

    /// Zoom factor for the content.
    pub zoom: f64,

    /// Block access to local files.
    pub block_local_file_access: bool,

    /// Stop slow running scripts.
    pub stop_slow_scripts: bool,

    /// Action taken when the document fails to load.
    pub error_action: Option<ErrorAction>,

    /// Proxy used when loading the document.
    pub proxy: String,

    /// Print the document background.
    pub print_background: bool,

    /// Load images.
    pub load_images: bool,

    /// Execute JavaScript.
    pub enable_javascript: bool,

    /// Shrink content to fit more on a page.
    pub use_smart_shrinking: bool,

    /// Minimum font size.
    pub min_font_size: u64,

    /// Encoding used when the document declares none.
    pub default_encoding: String,

    /// Render with the print media type instead of screen.
    pub use_print_media_type: bool,

    /// User stylesheet applied to the document.
    pub user_stylesheet_location: String,

    /// Enable NS plugins.
    pub enable_plugins: bool,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            use_external_links: true,
            use_local_links: true,
            produce_forms: false,
            include_in_outline: true,
            count_pages: true,
            toc: Toc::default(),
            header: HeaderFooter::default(),
            footer: HeaderFooter::default(),
            username: String::new(),
            password: String::new(),
            javascript_delay: 300,
            window_status: String::new(),
            zoom: 1.0,
            block_local_file_access: false,
            stop_slow_scripts: true,
            error_action: Some(ErrorAction::Abort),
            proxy: String::new(),
            print_background: true,
            load_images: true,
            enable_javascript: true,
            use_smart_shrinking: true,
            min_font_size: 0,
            default_encoding: "utf-8".to_string(),
            use_print_media_type: false,
            user_stylesheet_location: String::new(),
            enable_plugins: false,
        }
    }
}

impl ObjectOptions {
    /// Create object options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the zoom factor.
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the load error action.
    pub fn with_error_action(mut self, action: ErrorAction) -> Self {
        self.error_action = Some(action);
        self
    }

    /// Set login credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Wait for `window.status` to reach `status` before rendering.
    pub fn with_window_status(mut self, status: impl Into<String>) -> Self {
        self.window_status = status.into();
        self
    }

    /// Set the JavaScript delay in milliseconds.
    pub fn with_javascript_delay(mut self, millis: u64) -> Self {
        self.javascript_delay = millis;
        self
    }

    /// Set the header.
    pub fn with_header(mut self, header: HeaderFooter) -> Self {
        self.header = header;
        self
    }

    /// Set the footer.
    pub fn with_footer(mut self, footer: HeaderFooter) -> Self {
        self.footer = footer;
        self
    }

    /// Native setting operations for a document at `location`.
    pub fn ops<'a>(&'a self, location: &'a str) -> Vec<SetOp<'a>> {
        use SettingValue::*;

        let mut ops = vec![
            // General
            SetOp::always("page", Str(location)),
            SetOp::always("useExternalLinks", Bool(self.use_external_links)),
            SetOp::always("useLocalLinks", Bool(self.use_local_links)),
            SetOp::always("produceForms", Bool(self.produce_forms)),
            SetOp::always("includeInOutline", Bool(self.include_in_outline)),
            SetOp::always("pagesCount", Bool(self.count_pages)),
            // TOC
            SetOp::always("toc.useDottedLines", Bool(self.toc.use_dotted_lines)),
            SetOp::always("toc.captionText", Str(&self.toc.title)),
            SetOp::always("toc.forwardLinks", Bool(self.toc.generate_forward_links)),
            SetOp::always("toc.backLinks", Bool(self.toc.generate_back_links)),
            SetOp::non_zero("toc.indentation", Str(&self.toc.indentation)),
            SetOp::non_zero("toc.fontScale", Float(self.toc.font_scale)),
        ];

        ops.extend(self.header.ops(&HEADER_KEYS));
        ops.extend(self.footer.ops(&FOOTER_KEYS));

        ops.extend([
            // Load
            SetOp::non_zero("load.username", Str(&self.username)),
            SetOp::non_zero("load.password", Str(&self.password)),
            SetOp::non_zero("load.jsdelay", Uint(self.javascript_delay)),
            SetOp::non_zero("load.windowStatus", Str(&self.window_status)),
            SetOp::non_zero("load.zoomFactor", Float(self.zoom)),
            SetOp::always("load.blockLocalFileAccess", Bool(self.block_local_file_access)),
            SetOp::always("load.stopSlowScripts", Bool(self.stop_slow_scripts)),
            SetOp::non_zero(
                "load.loadErrorHandling",
                Str(self.error_action.map(|a| a.as_str()).unwrap_or("")),
            ),
            SetOp::non_zero("load.proxy", Str(&self.proxy)),
            // Web
            SetOp::always("web.background", Bool(self.print_background)),
            SetOp::always("web.loadImages", Bool(self.load_images)),
            SetOp::always("web.enableJavascript", Bool(self.enable_javascript)),
            SetOp::always("web.enableIntelligentShrinking", Bool(self.use_smart_shrinking)),
            SetOp::non_zero("web.minimumFontSize", Uint(self.min_font_size)),
            SetOp::non_zero("web.defaultEncoding", Str(&self.default_encoding)),
            SetOp::always("web.printMediaType", Bool(self.use_print_media_type)),
            SetOp::always("web.userStyleSheet", Str(&self.user_stylesheet_location)),
            SetOp::always("web.enablePlugins", Bool(self.enable_plugins)),
        ]);

        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::apply_ops;

    fn applied(options: &ObjectOptions, location: &str) -> Vec<(String, String)> {
        let mut sink = Vec::new();
        apply_ops(&options.ops(location), &mut sink).unwrap();
        sink
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_page_is_first() {
        let pairs = applied(&ObjectOptions::default(), "index.html");
        assert_eq!(pairs[0], ("page".to_string(), "index.html".to_string()));
    }

    #[test]
    fn test_default_encodings() {
        let pairs = applied(&ObjectOptions::default(), "index.html");

        assert_eq!(value(&pairs, "produceForms"), Some("false"));
        assert_eq!(value(&pairs, "load.jsdelay"), Some("300"));
        assert_eq!(value(&pairs, "load.zoomFactor"), Some("1E+00"));
        assert_eq!(value(&pairs, "toc.fontScale"), Some("1E+00"));
        assert_eq!(value(&pairs, "load.loadErrorHandling"), Some("abort"));
        assert_eq!(value(&pairs, "header.fontName"), Some("Arial"));
        assert_eq!(value(&pairs, "footer.fontSize"), Some("12"));
        assert_eq!(value(&pairs, "header.spacing"), Some("0E+00"));
        assert_eq!(value(&pairs, "header.left"), Some(""));
        assert_eq!(value(&pairs, "web.enablePlugins"), Some("false"));
        assert_eq!(value(&pairs, "load.username"), None);
        assert_eq!(value(&pairs, "web.minimumFontSize"), None);
    }

    #[test]
    fn test_fractional_zoom_is_not_emitted() {
        let pairs = applied(&ObjectOptions::new().with_zoom(0.8), "a.html");
        assert_eq!(value(&pairs, "load.zoomFactor"), None);

        let pairs = applied(&ObjectOptions::new().with_zoom(1.5), "a.html");
        assert_eq!(value(&pairs, "load.zoomFactor"), Some("1.5E+00"));
    }

    #[test]
    fn test_header_and_footer_keys() {
        let options = ObjectOptions::new()
            .with_header(HeaderFooter {
                content_center: "[title]".to_string(),
                display_separator: true,
                ..Default::default()
            })
            .with_footer(HeaderFooter {
                content_right: "[page]".to_string(),
                ..Default::default()
            });

        let pairs = applied(&options, "a.html");
        assert_eq!(value(&pairs, "header.center"), Some("[title]"));
        assert_eq!(value(&pairs, "header.line"), Some("true"));
        assert_eq!(value(&pairs, "footer.right"), Some("[page]"));
        assert_eq!(value(&pairs, "footer.line"), Some("false"));
    }

    #[test]
    fn test_deserialize_nested_defaults() {
        let options: ObjectOptions = serde_json::from_str(
            r#"{"footer": {"contentCenter": "[page]", "fontSize": 14}, "errorAction": "skip"}"#,
        )
        .unwrap();

        assert_eq!(options.footer.content_center, "[page]");
        assert_eq!(options.footer.font_size, 14);
        assert_eq!(options.footer.font, "Arial");
        assert_eq!(options.error_action, Some(ErrorAction::Skip));
        assert_eq!(options.toc.title, "Table of Contents");
        assert_eq!(options.javascript_delay, 300);
    }
}
