// Directory-backed page store.
//
// Each page is two files: `<name>.atlas`, a line-based text header listing the
// page parameters and its placements, and `<name>.png` holding the pixels.
//
//   w 1024
//   h 1024
//   d 96
//   p 4
//   r "hero_walk" 1 1 120 40 3 0 0 0 1.2 0.4 0 0 39 39
//
// `r` fields: name, x, y, w, h, frames, rotated, then optionally the logical
// bounds (4 floats) and the pixel bounds (4 ints).

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use crate::atlas::entry::AtlasRect;
use crate::atlas::page::{AtlasPage, PageHeader};
use crate::atlas::rect::{Bounds, PixelBounds, Rect};
use crate::error::AtlasError;
use crate::store::{PageStore, StoredPage};

pub const HEADER_EXTENSION: &str = "atlas";
pub const PIXELS_EXTENSION: &str = "png";

static RECT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^r\s+"((?:[^"\\]|\\.)*)"\s+(.*)$"#).expect("valid rect line regex"));

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn header_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, HEADER_EXTENSION))
    }

    pub fn pixels_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, PIXELS_EXTENSION))
    }

    fn write_header(&self, name: &str, header: &PageHeader, rects: &[&AtlasRect]) -> Result<(), AtlasError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.header_path(name), format_header(header, rects))?;
        Ok(())
    }
}

impl PageStore for FileStore {
    fn page_names(&self) -> Result<Vec<String>, AtlasError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(HEADER_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_page(&mut self, name: &str, header: &PageHeader) -> Result<(), AtlasError> {
        self.write_header(name, header, &[])?;
        info!("Created page file {}", self.header_path(name).display());
        Ok(())
    }

    fn load_page(&self, name: &str) -> Result<StoredPage, AtlasError> {
        let header_path = self.header_path(name);
        let text = match fs::read_to_string(&header_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(AtlasError::UnknownPage(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let (header, rects) = parse_header(&header_path, &text)?;

        let pixels_path = self.pixels_path(name);
        let pixels = if pixels_path.exists() {
            Some(image::open(&pixels_path)?.to_rgba8())
        } else {
            debug!("No pixels for page '{}', loading blank", name);
            None
        };

        Ok(StoredPage { header, rects, pixels })
    }

    fn save_page(&mut self, page: &AtlasPage) -> Result<(), AtlasError> {
        let rects: Vec<&AtlasRect> = page.valid_rects().collect();
        self.write_header(page.name(), page.header(), &rects)?;
        save_pixels(&self.pixels_path(page.name()), page.pixels())?;
        debug!("Saved page '{}' ({} entries)", page.name(), rects.len());
        Ok(())
    }

    fn delete_page(&mut self, name: &str) -> Result<(), AtlasError> {
        for path in [self.header_path(name), self.pixels_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!("Deleted page files for '{}'", name);
        Ok(())
    }
}

fn save_pixels(path: &Path, pixels: &RgbaImage) -> Result<(), AtlasError> {
    pixels.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

pub fn format_header(header: &PageHeader, rects: &[&AtlasRect]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "w {}", header.width);
    let _ = writeln!(out, "h {}", header.height);
    let _ = writeln!(out, "d {}", header.dpi);
    let _ = writeln!(out, "p {}", header.padding);

    for entry in rects {
        let r = entry.rect;
        let b = entry.bounds;
        let pb = entry.pixel_bounds;
        let _ = writeln!(
            out,
            "r \"{}\" {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            escape_name(&entry.content),
            r.x,
            r.y,
            r.w,
            r.h,
            entry.frame_count,
            entry.rotated as u8,
            b.min_x,
            b.min_y,
            b.max_x,
            b.max_y,
            pb.min_x,
            pb.min_y,
            pb.max_x,
            pb.max_y
        );
    }
    out
}

pub fn parse_header(path: &Path, text: &str) -> Result<(PageHeader, Vec<AtlasRect>), AtlasError> {
    let parse_error = |line: usize, message: String| AtlasError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut width = None;
    let mut height = None;
    let mut dpi = None;
    let mut padding = None;
    let mut rects = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("r ") || line == "r" {
            let entry = parse_rect_line(line).map_err(|message| parse_error(line_no, message))?;
            rects.push(entry);
            continue;
        }

        let mut tokens = line.split_whitespace();
        let key = tokens.next().unwrap_or_default();
        let value = tokens.next().ok_or_else(|| parse_error(line_no, format!("missing value for '{}'", key)))?;
        if let Some(extra) = tokens.next() {
            return Err(parse_error(line_no, format!("unexpected token '{}'", extra)));
        }

        match key {
            "w" => width = Some(parse_number::<i32>(value).map_err(|m| parse_error(line_no, m))?),
            "h" => height = Some(parse_number::<i32>(value).map_err(|m| parse_error(line_no, m))?),
            "d" => dpi = Some(parse_number::<u32>(value).map_err(|m| parse_error(line_no, m))?),
            "p" => padding = Some(parse_number::<i32>(value).map_err(|m| parse_error(line_no, m))?),
            other => return Err(parse_error(line_no, format!("unknown token '{}'", other))),
        }
    }

    let last_line = text.lines().count();
    let header = PageHeader {
        width: width.ok_or_else(|| parse_error(last_line, "missing 'w' line".to_string()))?,
        height: height.ok_or_else(|| parse_error(last_line, "missing 'h' line".to_string()))?,
        dpi: dpi.ok_or_else(|| parse_error(last_line, "missing 'd' line".to_string()))?,
        padding: padding.ok_or_else(|| parse_error(last_line, "missing 'p' line".to_string()))?,
    };

    Ok((header, rects))
}

fn parse_rect_line(line: &str) -> Result<AtlasRect, String> {
    let captures = RECT_LINE
        .captures(line)
        .ok_or_else(|| "expected r \"<name>\" x y w h frames rotated".to_string())?;
    let name = unescape_name(&captures[1]);
    let fields: Vec<&str> = captures[2].split_whitespace().collect();

    if !matches!(fields.len(), 6 | 10 | 14) {
        return Err(format!("expected 6, 10 or 14 fields after the name, found {}", fields.len()));
    }

    let rect = Rect::new(
        parse_number(fields[0])?,
        parse_number(fields[1])?,
        parse_number(fields[2])?,
        parse_number(fields[3])?,
    );
    let frame_count: u32 = parse_number(fields[4])?;
    let rotated = match fields[5] {
        "0" => false,
        "1" => true,
        other => return Err(format!("invalid rotated flag '{}'", other)),
    };

    let bounds = if fields.len() >= 10 {
        Bounds::new(
            parse_number(fields[6])?,
            parse_number(fields[7])?,
            parse_number(fields[8])?,
            parse_number(fields[9])?,
        )
    } else {
        Bounds::ZERO
    };

    let mut entry = AtlasRect::new(&name, rect, frame_count, rotated, bounds);
    if fields.len() == 14 {
        entry.pixel_bounds = PixelBounds::new(
            parse_number(fields[10])?,
            parse_number(fields[11])?,
            parse_number(fields[12])?,
            parse_number(fields[13])?,
        );
    }
    Ok(entry)
}

fn parse_number<T: std::str::FromStr>(token: &str) -> Result<T, String> {
    token.parse().map_err(|_| format!("invalid number '{}'", token))
}

fn escape_name(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: PageHeader = PageHeader { width: 128, height: 64, dpi: 96, padding: 4 };

    #[test]
    fn test_header_text_round_trip() {
        let mut entry = AtlasRect::new("hero \"walk\"", Rect::new(1, 1, 30, 10), 3, true, Bounds::new(-0.5, 0.0, 1.25, 2.0));
        entry.pixel_bounds = PixelBounds::new(1, 2, 8, 9);

        let text = format_header(&HEADER, &[&entry]);
        let (header, rects) = parse_header(Path::new("p.atlas"), &text).unwrap();
        assert_eq!(header, HEADER);
        assert_eq!(rects, vec![entry]);
    }

    #[test]
    fn test_short_rect_line_uses_full_frame() {
        let text = "w 64\nh 64\nd 1\np 0\nr \"a\" 1 1 20 10 2 0\n";
        let (_, rects) = parse_header(Path::new("p.atlas"), text).unwrap();
        assert_eq!(rects[0].bounds, Bounds::ZERO);
        assert_eq!(rects[0].pixel_bounds, PixelBounds::new(0, 0, 9, 9));
    }

    #[test]
    fn test_unknown_token_names_line() {
        let text = "w 64\nh 64\nz 3\n";
        let err = parse_header(Path::new("bad.atlas"), text).unwrap_err();
        assert_eq!(err.to_string(), "bad.atlas:3: unknown token 'z'");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let err = parse_header(Path::new("bad.atlas"), "w 64\nh 64\nd 1\n").unwrap_err();
        assert!(matches!(err, AtlasError::Parse { .. }));
    }
}
