/*
 * mime.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Smolnet, a client for small-internet protocols.
 *
 * Smolnet is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Smolnet is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Smolnet.  If not, see <http://www.gnu.org/licenses/>.
 */

//! MIME type inference for Gopher items.
//!
//! Gopher responses carry no type information, so the best guess comes
//! from the selector's item type, falling back to the path's file
//! extension for the generic binary types. No content sniffing.

const OCTET_STREAM: &str = "application/octet-stream";

/// Infer a MIME type from the item type and request path.
pub fn resolve(item_type: char, path: &str) -> String {
    match item_type {
        '1' | '7' => "application/gopher-menu".to_string(),
        '0' | '3' => "text/plain".to_string(),
        'h' => "text/html".to_string(),
        'g' => "image/gif".to_string(),
        '4' => "application/mac-binhex4".to_string(),
        'I' | 's' | 'd' | '9' => for_extension(&extension(path)),
        _ => OCTET_STREAM.to_string(),
    }
}

/// Last-segment file extension, lowercased, without the dot.
fn extension(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() => name[i + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Best guess for the commonly served extensions; octet-stream otherwise.
fn for_extension(ext: &str) -> String {
    match ext {
        "jpg" => "image/jpeg".to_string(),
        "gif" | "png" | "bmp" | "jpeg" => format!("image/{}", ext),
        "mp3" => "audio/mpeg".to_string(),
        "wav" | "ogg" | "flac" => format!("audio/{}", ext),
        "pdf" => "application/pdf".to_string(),
        "doc" => "application/msword".to_string(),
        "ps" => "application/postscript".to_string(),
        "zip" => "application/zip".to_string(),
        _ => OCTET_STREAM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menus_and_search_are_gopher_menu() {
        assert_eq!(resolve('1', "/1"), "application/gopher-menu");
        assert_eq!(resolve('7', "/7search"), "application/gopher-menu");
    }

    #[test]
    fn text_types_ignore_the_extension() {
        assert_eq!(resolve('0', "/0notes.jpg"), "text/plain");
        assert_eq!(resolve('3', "/3error"), "text/plain");
        assert_eq!(resolve('h', "/hpage"), "text/html");
        assert_eq!(resolve('g', "/gpicture"), "image/gif");
        assert_eq!(resolve('4', "/4archive.hqx"), "application/mac-binhex4");
    }

    #[test]
    fn binary_types_fall_back_to_the_extension() {
        assert_eq!(resolve('I', "/Iphotos/cat.jpg"), "image/jpeg");
        assert_eq!(resolve('I', "/Iphotos/cat.PNG"), "image/png");
        assert_eq!(resolve('9', "/9music/track.mp3"), "audio/mpeg");
        assert_eq!(resolve('9', "/9music/track.flac"), "audio/flac");
        assert_eq!(resolve('d', "/dpapers/thesis.pdf"), "application/pdf");
        assert_eq!(resolve('d', "/dpapers/letter.doc"), "application/msword");
        assert_eq!(resolve('s', "/ssounds/beep.wav"), "audio/wav");
        assert_eq!(resolve('9', "/9files/bundle.zip"), "application/zip");
    }

    #[test]
    fn unknown_extensions_and_types_are_octet_stream() {
        assert_eq!(resolve('9', "/9files/data.xyz"), "application/octet-stream");
        assert_eq!(resolve('9', "/9files/noext"), "application/octet-stream");
        assert_eq!(resolve('9', "/9files/trailing."), "application/octet-stream");
        assert_eq!(resolve('x', "/xweird.jpg"), "application/octet-stream");
    }
}
