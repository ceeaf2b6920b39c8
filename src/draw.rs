//! Drawing surface for the status bars, plus the cursors shown by the window
//! manager.
use anyhow::{anyhow, Context, Result};
use xcb::Window;

use crate::xconnection::CursorKind;

// Glyphs in the standard X "cursor" font
const XC_FLEUR: u16 = 52;
const XC_LEFT_PTR: u16 = 68;
const XC_SIZING: u16 = 120;

/// Which colour scheme the next drawing operations use
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SchemeKind {
    Norm,
    Sel,
}

impl SchemeKind {
    fn index(self) -> usize {
        match self {
            SchemeKind::Norm => 0,
            SchemeKind::Sel => 1,
        }
    }
}

// Slots of a scheme
const COL_FG: usize = 0;
const COL_BG: usize = 1;
const COL_BORDER: usize = 2;

/**
 * An off-screen canvas the bar is rendered into before being copied onto a
 * bar window.
 */
pub trait Draw {
    /// Height of the loaded font in pixels
    fn font_height(&self) -> i32;
    /// Width of `text` in pixels, without any padding
    fn text_width(&self, text: &str) -> i32;
    fn set_scheme(&mut self, scheme: SchemeKind);
    /// Draw a rectangle in the scheme's foreground, or background when
    /// `invert` is set
    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, filled: bool, invert: bool);
    /// Fill the box with the background and draw `text` after `lpad` pixels,
    /// clipped to the box. Returns the x coordinate just past the box.
    fn text(&mut self, x: i32, y: i32, w: i32, h: i32, lpad: i32, text: &str, invert: bool) -> i32;
    /// Copy the given region of the canvas onto `win`
    fn map(&mut self, win: Window, x: i32, y: i32, w: i32, h: i32);
    fn resize(&mut self, w: i32, h: i32);
    /// Pixel value of the scheme's border colour
    fn border_pixel(&self, scheme: SchemeKind) -> u32;
}

/// The three cursors the window manager switches between
pub struct Cursors {
    normal: xcb::Cursor,
    resize: xcb::Cursor,
    moving: xcb::Cursor,
}

impl Cursors {
    pub fn new(conn: &xcb::Connection) -> Result<Cursors> {
        let font = conn.generate_id();
        xcb::open_font_checked(conn, font, "cursor")
            .request_check()
            .context("unable to open the cursor font")?;

        let glyph = |c: u16| {
            let cursor = conn.generate_id();
            xcb::create_glyph_cursor(conn, cursor, font, font, c, c + 1, 0, 0, 0, 0xffff, 0xffff, 0xffff);
            cursor
        };
        let cursors = Cursors {
            normal: glyph(XC_LEFT_PTR),
            resize: glyph(XC_SIZING),
            moving: glyph(XC_FLEUR),
        };
        xcb::close_font(conn, font);
        Ok(cursors)
    }

    pub fn get(&self, kind: CursorKind) -> xcb::Cursor {
        match kind {
            CursorKind::Normal => self.normal,
            CursorKind::Resize => self.resize,
            CursorKind::Move => self.moving,
        }
    }

    pub fn free(&self, conn: &xcb::Connection) {
        for c in &[self.normal, self.resize, self.moving] {
            xcb::free_cursor(conn, *c);
        }
    }
}

/// Parse "#rrggbb" into 16 bit per channel components
pub fn parse_color(hex: &str) -> Result<(u16, u16, u16)> {
    let digits = hex
        .strip_prefix('#')
        .filter(|d| d.len() == 6)
        .ok_or_else(|| anyhow!("cannot allocate color '{}'", hex))?;
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|c| c as u16 * 257)
            .map_err(|_| anyhow!("cannot allocate color '{}'", hex))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

struct Font {
    id: xcb::Font,
    ascent: i32,
    descent: i32,
    /// Advance widths of the printable latin-1 range
    widths: Vec<i32>,
    default_width: i32,
}

impl Font {
    fn open(conn: &xcb::Connection, name: &str) -> Option<Font> {
        let id = conn.generate_id();
        if xcb::open_font_checked(conn, id, name).request_check().is_err() {
            return None;
        }
        let info = match xcb::query_font(conn, id).get_reply() {
            Ok(info) => info,
            Err(_) => {
                xcb::close_font(conn, id);
                return None;
            }
        };

        let first = info.min_char_or_byte2() as usize;
        let mut widths = vec![0; 256];
        let mut listed = 0;
        for (i, ci) in info.char_infos().enumerate() {
            if let Some(w) = widths.get_mut(first + i) {
                *w = ci.character_width() as i32;
            }
            listed += 1;
        }
        let default_width = info.max_bounds().character_width() as i32;
        if listed == 0 {
            widths.iter_mut().for_each(|w| *w = default_width);
        }

        Some(Font {
            id,
            ascent: info.font_ascent() as i32,
            descent: info.font_descent() as i32,
            widths,
            default_width,
        })
    }

    /// Width of `text` as it is rendered, after substitution
    fn width(&self, text: &str) -> i32 {
        printable(text)
            .chars()
            .map(|c| self.widths.get(c as usize).copied().unwrap_or(self.default_width))
            .sum()
    }
}

/// Core fonts only cover a single byte per glyph
fn printable(text: &str) -> String {
    text.chars().map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' }).collect()
}

/// Draw backed by a server side pixmap and core X fonts
pub struct XcbDraw<'a> {
    conn: &'a xcb::Connection,
    root: Window,
    depth: u8,
    pixmap: xcb::Pixmap,
    gc: xcb::Gcontext,
    font: Font,
    schemes: [[u32; 3]; 2],
    scheme: SchemeKind,
}

impl<'a> XcbDraw<'a> {
    /**
     * Create a canvas the size of the screen.
     *
     * The first loadable font of `fonts` is used. `colors` holds the
     * [foreground, background, border] hex strings of the normal and the
     * selected scheme.
     */
    pub fn new(conn: &'a xcb::Connection, fonts: &[String], colors: &[[String; 3]; 2]) -> Result<XcbDraw<'a>> {
        let screen = conn
            .get_setup()
            .roots()
            .next()
            .context("Unable to get the default screen")?;
        let (root, depth, cmap) = (screen.root(), screen.root_depth(), screen.default_colormap());
        let (w, h) = (screen.width_in_pixels() as i32, screen.height_in_pixels() as i32);

        if fonts.is_empty() {
            return Err(anyhow!("no fonts could be loaded"));
        }
        let font = fonts
            .iter()
            .find_map(|name| {
                let f = Font::open(conn, name);
                if f.is_none() {
                    warn!("cannot load font '{}'", name);
                }
                f
            })
            .ok_or_else(|| anyhow!("no fonts could be loaded"))?;

        let mut schemes = [[0; 3]; 2];
        for (scheme, names) in schemes.iter_mut().zip(colors.iter()) {
            for (px, name) in scheme.iter_mut().zip(names.iter()) {
                let (r, g, b) = parse_color(name)?;
                *px = xcb::alloc_color(conn, cmap, r, g, b)
                    .get_reply()
                    .with_context(|| format!("cannot allocate color '{}'", name))?
                    .pixel();
            }
        }

        let pixmap = conn.generate_id();
        xcb::create_pixmap(conn, depth, pixmap, root, w as u16, h as u16);
        let gc = conn.generate_id();
        xcb::create_gc(
            conn,
            gc,
            root,
            &[
                (xcb::GC_LINE_WIDTH, 1),
                (xcb::GC_FONT, font.id),
                (xcb::GC_GRAPHICS_EXPOSURES, 0),
            ],
        );

        Ok(XcbDraw {
            conn,
            root,
            depth,
            pixmap,
            gc,
            font,
            schemes,
            scheme: SchemeKind::Norm,
        })
    }

    fn color(&self, slot: usize) -> u32 {
        self.schemes[self.scheme.index()][slot]
    }

    fn fill(&self, pixel: u32, x: i32, y: i32, w: i32, h: i32) {
        xcb::change_gc(self.conn, self.gc, &[(xcb::GC_FOREGROUND, pixel)]);
        xcb::poly_fill_rectangle(
            self.conn,
            self.pixmap,
            self.gc,
            &[xcb::Rectangle::new(x as i16, y as i16, w as u16, h as u16)],
        );
    }
}

impl<'a> Draw for XcbDraw<'a> {
    fn font_height(&self) -> i32 {
        self.font.ascent + self.font.descent
    }

    fn text_width(&self, text: &str) -> i32 {
        self.font.width(text)
    }

    fn set_scheme(&mut self, scheme: SchemeKind) {
        self.scheme = scheme;
    }

    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, filled: bool, invert: bool) {
        let pixel = self.color(if invert { COL_BG } else { COL_FG });
        if filled {
            self.fill(pixel, x, y, w, h);
        } else {
            xcb::change_gc(self.conn, self.gc, &[(xcb::GC_FOREGROUND, pixel)]);
            xcb::poly_rectangle(
                self.conn,
                self.pixmap,
                self.gc,
                &[xcb::Rectangle::new(x as i16, y as i16, (w - 1) as u16, (h - 1) as u16)],
            );
        }
    }

    fn text(&mut self, x: i32, y: i32, w: i32, h: i32, lpad: i32, text: &str, invert: bool) -> i32 {
        if w <= 0 {
            return x;
        }
        let (fg, bg) = if invert {
            (self.color(COL_BG), self.color(COL_FG))
        } else {
            (self.color(COL_FG), self.color(COL_BG))
        };
        self.fill(bg, x, y, w, h);

        let avail = w - lpad;
        let mut shown = printable(text);
        if self.font.width(&shown) > avail {
            // drop characters until the text and an ellipsis fit
            while !shown.is_empty() && self.font.width(&shown) + self.font.width("...") > avail {
                shown.pop();
            }
            if !shown.is_empty() {
                shown.push_str("...");
            }
        }

        if !shown.is_empty() {
            let ty = y + (h - self.font_height()) / 2 + self.font.ascent;
            xcb::change_gc(self.conn, self.gc, &[(xcb::GC_FOREGROUND, fg), (xcb::GC_BACKGROUND, bg)]);
            xcb::image_text_8(self.conn, self.pixmap, self.gc, (x + lpad) as i16, ty as i16, &shown);
        }
        x + w
    }

    fn map(&mut self, win: Window, x: i32, y: i32, w: i32, h: i32) {
        xcb::copy_area(
            self.conn,
            self.pixmap,
            win,
            self.gc,
            x as i16,
            y as i16,
            x as i16,
            y as i16,
            w as u16,
            h as u16,
        );
        self.conn.flush();
    }

    fn resize(&mut self, w: i32, h: i32) {
        xcb::free_pixmap(self.conn, self.pixmap);
        self.pixmap = self.conn.generate_id();
        xcb::create_pixmap(self.conn, self.depth, self.pixmap, self.root, w as u16, h as u16);
    }

    fn border_pixel(&self, scheme: SchemeKind) -> u32 {
        self.schemes[scheme.index()][COL_BORDER]
    }
}

impl<'a> Drop for XcbDraw<'a> {
    fn drop(&mut self) {
        xcb::free_pixmap(self.conn, self.pixmap);
        xcb::free_gc(self.conn, self.gc);
        xcb::close_font(self.conn, self.font.id);
        self.conn.flush();
    }
}
