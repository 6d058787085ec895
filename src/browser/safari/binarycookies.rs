use crate::browser::Cookie;
use crate::error::{ExportError, Result};

const FILE_MAGIC: &[u8] = b"cook";
const PAGE_SIGNATURE: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
const FLAG_SECURE: u32 = 0x1;
const FLAG_HTTP_ONLY: u32 = 0x4;
/// Seconds between 1970-01-01 and 2001-01-01.
const MAC_EPOCH_OFFSET: i64 = 978_307_200;

/// Parse the contents of a `Cookies.binarycookies` file.
///
/// Malformed records are skipped with a warning; a malformed header or page
/// table is an error.
pub(crate) fn parse_binary_cookies(data: &[u8]) -> Result<Vec<Cookie>> {
    let mut reader = Reader::new(data);
    if reader.take(4)? != FILE_MAGIC {
        return Err(malformed("not a binarycookies file"));
    }
    let page_count = reader.u32_be()? as usize;
    let mut page_sizes = Vec::with_capacity(page_count.min(1024));
    for _ in 0..page_count {
        page_sizes.push(reader.u32_be()? as usize);
    }

    let mut cookies = Vec::new();
    for (index, size) in page_sizes.into_iter().enumerate() {
        let page = reader.take(size)?;
        if let Err(err) = parse_page(page, &mut cookies) {
            log::warn!("Skipping Safari cookie page {}: {}", index, err);
        }
    }
    Ok(cookies)
}

fn parse_page(page: &[u8], cookies: &mut Vec<Cookie>) -> Result<()> {
    let mut reader = Reader::new(page);
    if reader.take(4)? != PAGE_SIGNATURE {
        return Err(malformed("unexpected page signature"));
    }
    let count = reader.u32_le()? as usize;
    let mut offsets = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        offsets.push(reader.u32_le()? as usize);
    }

    for offset in offsets {
        let record = page
            .get(offset..)
            .ok_or_else(|| malformed("record offset out of bounds"))?;
        match parse_record(record) {
            Ok(cookie) => cookies.push(cookie),
            Err(err) => log::warn!("Skipping malformed Safari cookie: {}", err),
        }
    }
    Ok(())
}

fn parse_record(data: &[u8]) -> Result<Cookie> {
    let mut reader = Reader::new(data);
    let size = reader.u32_le()? as usize;
    let record = data
        .get(..size)
        .ok_or_else(|| malformed("record size out of bounds"))?;

    reader.skip(4)?;
    let flags = reader.u32_le()?;
    reader.skip(4)?;
    let domain_offset = reader.u32_le()? as usize;
    let name_offset = reader.u32_le()? as usize;
    let path_offset = reader.u32_le()? as usize;
    let value_offset = reader.u32_le()? as usize;
    reader.skip(8)?;
    let expiration = reader.f64_le()?;
    let _creation = reader.f64_le()?;

    let expires = mac_absolute_to_unix(expiration);
    Ok(Cookie {
        domain: read_null_terminated_string_at(record, domain_offset)?,
        name: read_null_terminated_string_at(record, name_offset)?,
        path: read_null_terminated_string_at(record, path_offset)?,
        value: read_null_terminated_string_at(record, value_offset)?,
        secure: flags & FLAG_SECURE != 0,
        http_only: flags & FLAG_HTTP_ONLY != 0,
        expires: (expires > 0).then_some(expires),
    })
}

pub(super) fn read_null_terminated_string_at(data: &[u8], offset: usize) -> Result<String> {
    let tail = data
        .get(offset..)
        .filter(|tail| !tail.is_empty())
        .ok_or_else(|| malformed("string offset out of bounds"))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| malformed("string is not terminated"))?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

pub(super) fn mac_absolute_to_unix(seconds: f64) -> i64 {
    seconds as i64 + MAC_EPOCH_OFFSET
}

fn malformed(detail: &str) -> ExportError {
    ExportError::BrowserCookie(format!("Malformed Safari cookies: {}", detail))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| malformed("unexpected end of data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32_be(&mut self) -> Result<u32> {
        self.array().map(u32::from_be_bytes)
    }

    fn u32_le(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn f64_le(&mut self) -> Result<f64> {
        self.array().map(f64::from_le_bytes)
    }
}

#[cfg(test)]
pub(super) mod test_support {
    /// Encode cookies the way Safari lays them out on disk.
    pub fn encode_binary_cookies(pages: &[Vec<(&str, &str, &str, &str, u32, f64)>]) -> Vec<u8> {
        let encoded_pages: Vec<Vec<u8>> = pages.iter().map(|page| encode_page(page)).collect();
        let mut out = b"cook".to_vec();
        out.extend_from_slice(&(encoded_pages.len() as u32).to_be_bytes());
        for page in &encoded_pages {
            out.extend_from_slice(&(page.len() as u32).to_be_bytes());
        }
        for page in encoded_pages {
            out.extend_from_slice(&page);
        }
        out
    }

    fn encode_page(cookies: &[(&str, &str, &str, &str, u32, f64)]) -> Vec<u8> {
        let records: Vec<Vec<u8>> = cookies.iter().map(encode_record).collect();
        let header_len = 4 + 4 + 4 * records.len() + 4;
        let mut out = vec![0x00, 0x00, 0x01, 0x00];
        out.extend_from_slice(&(records.len() as u32).to_le_bytes());
        let mut offset = header_len;
        for record in &records {
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += record.len();
        }
        out.extend_from_slice(&[0, 0, 0, 0]);
        for record in records {
            out.extend_from_slice(&record);
        }
        out
    }

    fn encode_record(cookie: &(&str, &str, &str, &str, u32, f64)) -> Vec<u8> {
        let (domain, name, path, value, flags, expiration) = *cookie;
        const HEADER_LEN: usize = 56;
        let mut strings = Vec::new();
        let mut offsets = Vec::new();
        for text in [domain, name, path, value] {
            offsets.push((HEADER_LEN + strings.len()) as u32);
            strings.extend_from_slice(text.as_bytes());
            strings.push(0);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&((HEADER_LEN + strings.len()) as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        for offset in offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&expiration.to_le_bytes());
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&strings);
        out
    }
}
