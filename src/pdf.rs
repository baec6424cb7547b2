use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use printpdf::*;
use tracing::debug;

use crate::error::{Result, VodError};
use crate::fmt::money;
use crate::models::{ClassifiedTransaction, HeaderInfo, Label};
use crate::reviewer::visible;
use crate::settings::Settings;

// US Letter dimensions (mm)
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN_TOP: f32 = 12.7;
const MARGIN_BOTTOM: f32 = 12.7;
const MARGIN_LEFT: f32 = 19.05;
const MARGIN_RIGHT: f32 = 19.05;
const ROW_H: f32 = 5.0;
const FONT_SIZE: f32 = 9.0;
const TITLE_SIZE: f32 = 18.0;
const FOOTER_SIZE: f32 = 8.0;
const LOGO_W: f32 = 63.5;
const LOGO_H: f32 = 25.4;
const DESC_WRAP: usize = 48;

const FONT_REGULAR: &str = "DejaVuSans.ttf";
const FONT_BOLD: &str = "DejaVuSans-Bold.ttf";

const TITLE: &str = "Verification of Deposit";
const EMPTY_TABLE: &str = "No qualifying transactions found.";

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

fn brand_green() -> Color {
    Color::Rgb(Rgb::new(0.29, 0.40, 0.25, None))
}

fn grey() -> Color {
    Color::Greyscale(Greyscale::new(0.4, None))
}

fn black() -> Color {
    Color::Greyscale(Greyscale::new(0.0, None))
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Files and timezone the renderer needs, resolved once per renderer.
#[derive(Debug, Clone)]
pub struct RenderAssets {
    pub logo_path: Option<PathBuf>,
    /// Directory holding DejaVuSans.ttf and DejaVuSans-Bold.ttf. Built-in
    /// Helvetica is used when unset.
    pub font_dir: Option<PathBuf>,
    pub timezone: Tz,
}

impl Default for RenderAssets {
    fn default() -> Self {
        Self {
            logo_path: None,
            font_dir: None,
            timezone: chrono_tz::America::New_York,
        }
    }
}

impl RenderAssets {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            logo_path: settings.logo_path.as_ref().map(PathBuf::from),
            font_dir: settings.font_dir.as_ref().map(PathBuf::from),
            timezone: settings.tz()?,
        })
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| VodError::Render(format!("missing asset {}: {e}", path.display())))
}

struct LoadedFonts {
    regular: Vec<u8>,
    bold: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Table model
// ---------------------------------------------------------------------------

/// One visible line of the deposits table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub date: String,
    pub label: Option<String>,
    pub description: String,
    pub credits: String,
}

pub fn table_rows(transactions: &[ClassifiedTransaction]) -> Vec<TableRow> {
    visible(transactions)
        .into_iter()
        .map(|t| TableRow {
            date: t.raw.date_text.clone(),
            label: t.label.as_ref().and_then(Label::text).map(str::to_string),
            description: t.raw.description.clone(),
            credits: money(t.raw.amount),
        })
        .collect()
}

/// Label/value pairs for the header block, two per line.
pub fn header_rows(header: &HeaderInfo) -> Vec<[String; 4]> {
    let value = |key: &str| header.get(key).cloned().unwrap_or_else(|| "N/A".to_string());
    vec![
        [
            "Name:".to_string(),
            value("Name"),
            "Account #:".to_string(),
            value("Account #"),
        ],
        [
            "Client ID:".to_string(),
            value("Res ID"),
            "Status:".to_string(),
            value("Status"),
        ],
        [
            "Date Opened:".to_string(),
            value("Date Opened"),
            String::new(),
            String::new(),
        ],
    ]
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str, fonts: Option<&LoadedFonts>) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let (font, font_bold) = match fonts {
            Some(f) => (
                doc.add_external_font(Cursor::new(f.regular.as_slice()))
                    .map_err(|e| VodError::Render(format!("{e:?}")))?,
                doc.add_external_font(Cursor::new(f.bold.as_slice()))
                    .map_err(|e| VodError::Render(format!("{e:?}")))?,
            ),
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| VodError::Render(format!("{e:?}")))?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(|e| VodError::Render(format!("{e:?}")))?,
            ),
        };
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc
            .get_page(self.current_page)
            .get_layer(self.current_layer)
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer().use_text(s, size, Mm(x), Mm(self.pdf_y()), font);
    }

    fn colored_text(&self, s: &str, x: f32, size: f32, bold: bool, color: Color) {
        let layer = self.layer();
        layer.set_fill_color(color);
        self.text(s, x, size, bold);
        layer.set_fill_color(black());
    }

    fn centered(&self, s: &str, size: f32, bold: bool, color: Color) {
        let x = (PAGE_W - approx_text_width(s, size)) / 2.0;
        self.colored_text(s, x.max(MARGIN_LEFT), size, bold, color);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self.layer();
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn separator(&mut self) {
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    fn logo(&mut self, png: &[u8]) -> Result<()> {
        let decoder = image_crate::codecs::png::PngDecoder::new(Cursor::new(png))
            .map_err(|e| VodError::Render(format!("logo: {e}")))?;
        let image = Image::try_from(decoder).map_err(|e| VodError::Render(format!("logo: {e}")))?;
        let dpi = 300.0;
        let natural_w = image.image.width.0 as f32 / dpi * 25.4;
        let natural_h = image.image.height.0 as f32 / dpi * 25.4;
        let transform = ImageTransform {
            translate_x: Some(Mm((PAGE_W - LOGO_W) / 2.0)),
            translate_y: Some(Mm(self.pdf_y() - LOGO_H)),
            scale_x: Some(LOGO_W / natural_w.max(0.1)),
            scale_y: Some(LOGO_H / natural_h.max(0.1)),
            dpi: Some(dpi),
            ..Default::default()
        };
        image.add_to_layer(self.layer(), transform);
        self.y += LOGO_H + 5.0;
        Ok(())
    }

    fn cells(&self, cols: &[Col], values: &[&str], bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            match col.align {
                Align::Left => self.text(value, x, FONT_SIZE, bold),
                Align::Right => {
                    let tw = approx_text_width(value, FONT_SIZE);
                    self.text(value, x + col.width - tw, FONT_SIZE, bold);
                }
            }
            x += col.width;
        }
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        self.cells(cols, headers, true);
        self.y += ROW_H;
        self.separator();
    }

    fn header_block(&mut self, rows: &[[String; 4]]) {
        let widths = [33.0, 50.8, 38.1, 50.8];
        for row in rows {
            self.ensure_space(ROW_H + 1.0);
            let mut x = MARGIN_LEFT;
            for (i, (value, width)) in row.iter().zip(widths).enumerate() {
                if i % 2 == 0 {
                    self.colored_text(value, x, FONT_SIZE, true, grey());
                } else {
                    self.text(value, x, FONT_SIZE, false);
                }
                x += width;
            }
            self.y += ROW_H + 1.0;
        }
    }

    fn deposit_row(&mut self, cols: &[Col], row: &TableRow) {
        let desc_lines: Vec<String> = textwrap::wrap(&row.description, DESC_WRAP)
            .into_iter()
            .map(|l| l.into_owned())
            .collect();
        let date_lines = if row.label.is_some() { 2 } else { 1 };
        let lines = desc_lines.len().max(date_lines).max(1);
        self.ensure_space(ROW_H * lines as f32 + 1.0);

        let top = self.y;
        let first_desc = desc_lines.first().map(String::as_str).unwrap_or("");
        self.cells(cols, &[row.date.as_str(), first_desc, row.credits.as_str()], false);
        for (i, line) in desc_lines.iter().enumerate().skip(1) {
            self.y = top + ROW_H * i as f32;
            self.text(line, MARGIN_LEFT + cols[0].width, FONT_SIZE, false);
        }
        if let Some(label) = &row.label {
            self.y = top + ROW_H;
            self.colored_text(&format!("({label})"), MARGIN_LEFT, FONT_SIZE - 1.0, true, brand_green());
        }
        self.y = top + ROW_H * lines as f32 + 1.0;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| VodError::Render(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| VodError::Render(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

pub struct Renderer {
    timezone: Tz,
    logo: Option<Vec<u8>>,
    fonts: Option<LoadedFonts>,
}

impl Renderer {
    /// Load configured assets up front; a configured but unreadable asset is a
    /// render error.
    pub fn new(assets: RenderAssets) -> Result<Self> {
        let logo = assets.logo_path.as_deref().map(read_asset).transpose()?;
        let fonts = match &assets.font_dir {
            Some(dir) => Some(LoadedFonts {
                regular: read_asset(&dir.join(FONT_REGULAR))?,
                bold: read_asset(&dir.join(FONT_BOLD))?,
            }),
            None => None,
        };
        Ok(Self {
            timezone: assets.timezone,
            logo,
            fonts,
        })
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn render(
        &self,
        header: &HeaderInfo,
        transactions: &[ClassifiedTransaction],
    ) -> Result<Vec<u8>> {
        self.render_at(header, transactions, self.now())
    }

    pub fn render_at(
        &self,
        header: &HeaderInfo,
        transactions: &[ClassifiedTransaction],
        generated: DateTime<Tz>,
    ) -> Result<Vec<u8>> {
        let mut pdf = PdfWriter::new(TITLE, self.fonts.as_ref())?;

        if let Some(png) = &self.logo {
            pdf.logo(png)?;
        }

        pdf.y += 6.0;
        pdf.centered(TITLE, TITLE_SIZE, true, brand_green());
        pdf.y += 14.0;

        pdf.header_block(&header_rows(header));
        pdf.y += 8.0;

        let rows = table_rows(transactions);
        if rows.is_empty() {
            pdf.text(EMPTY_TABLE, MARGIN_LEFT, FONT_SIZE + 1.0, false);
            pdf.y += ROW_H;
        } else {
            let cols = &[
                Col { width: 45.7, align: Align::Left },
                Col { width: 81.3, align: Align::Left },
                Col { width: 38.1, align: Align::Right },
            ];
            pdf.table_header(cols, &["Date", "Description", "Credits"]);
            for row in &rows {
                pdf.deposit_row(cols, row);
            }
            pdf.separator();
        }

        pdf.y += 12.0;
        pdf.ensure_space(ROW_H);
        let stamp = generated.format("Generated: %m/%d/%Y %I:%M %p").to_string();
        pdf.colored_text(&stamp, MARGIN_LEFT, FOOTER_SIZE, false, grey());

        debug!(rows = rows.len(), "rendered deposit verification");
        pdf.to_bytes()
    }
}
