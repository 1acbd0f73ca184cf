//! Z80 snapshot RLE.
//!
//! Any run of >= 5 identical bytes, or any occurrence of the literal byte
//! 0xED followed by another 0xED, is encoded as `ED ED <count> <value>`.
//! `count == 0` is illegal. Mandatory property: `decompress(compress(x))
//! == x` for every 16 KiB page.

use crate::error::{CoreError, CoreResult};
use crate::memory::{Page, PAGE_SIZE};

const ESCAPE: u8 = 0xED;
const MIN_RUN: usize = 5;
const MAX_RUN: usize = 255;

pub fn compress(page: &Page) -> Vec<u8> {
    let mut out = Vec::with_capacity(PAGE_SIZE);
    let mut i = 0;
    while i < page.len() {
        let byte = page[i];
        let mut run_len = 1;
        while i + run_len < page.len() && page[i + run_len] == byte && run_len < MAX_RUN {
            run_len += 1;
        }

        // Any run of >= 5 identical bytes always gets escaped. A run of
        // two or more 0xED bytes must be escaped even below the general
        // threshold, since two literal 0xED bytes in the stream would
        // otherwise be indistinguishable from the escape sequence itself.
        let must_escape = run_len >= MIN_RUN || (byte == ESCAPE && run_len >= 2);

        if must_escape {
            out.push(ESCAPE);
            out.push(ESCAPE);
            out.push(run_len as u8);
            out.push(byte);
            i += run_len;
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

pub fn decompress(data: &[u8], out: &mut Page) -> CoreResult<()> {
    for b in out.iter_mut() {
        *b = 0;
    }

    let mut src = 0usize;
    let mut dst = 0usize;
    while src < data.len() {
        if src + 3 < data.len() && data[src] == ESCAPE && data[src + 1] == ESCAPE {
            let count = data[src + 2];
            if count == 0 {
                return Err(CoreError::InvalidFormat("Z80 RLE run count of 0 is illegal".into()));
            }
            let value = data[src + 3];
            for _ in 0..count {
                if dst >= out.len() {
                    return Err(CoreError::InvalidFormat(
                        "Z80 RLE run overflows 16 KiB page".into(),
                    ));
                }
                out[dst] = value;
                dst += 1;
            }
            src += 4;
        } else {
            if dst >= out.len() {
                return Err(CoreError::InvalidFormat(
                    "Z80 compressed block overflows 16 KiB page".into(),
                ));
            }
            out[dst] = data[src];
            dst += 1;
            src += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompresses_run_of_zeroes() {
        let mut out = [0xFFu8; PAGE_SIZE];
        decompress(&[0xED, 0xED, 0x05, 0x00], &mut out).unwrap();
        assert_eq!(&out[..5], &[0u8; 5]);
    }

    #[test]
    fn decompresses_escaped_ed_pair() {
        let mut out = [0u8; PAGE_SIZE];
        decompress(&[0xED, 0xED, 0x02, 0xED], &mut out).unwrap();
        assert_eq!(&out[..2], &[0xED, 0xED]);
    }

    #[test]
    fn zero_count_is_rejected() {
        let mut out = [0u8; PAGE_SIZE];
        let err = decompress(&[0xED, 0xED, 0x00, 0x00], &mut out).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }

    #[test]
    fn roundtrip_property_holds_for_varied_pages() {
        let mut page: Page = [0u8; PAGE_SIZE];
        for (i, b) in page.iter_mut().enumerate() {
            *b = ((i * 37) % 256) as u8;
        }
        // inject runs and literal ED bytes
        for i in 100..120 {
            page[i] = 0x42;
        }
        page[500] = 0xED;
        page[501] = 0xED;
        page[502] = 0x01;

        let compressed = compress(&page);
        let mut roundtrip = [0u8; PAGE_SIZE];
        decompress(&compressed, &mut roundtrip).unwrap();
        assert_eq!(page, roundtrip);
    }

    #[test]
    fn roundtrip_property_holds_for_uniform_page() {
        let page: Page = [0x5A; PAGE_SIZE];
        let compressed = compress(&page);
        let mut roundtrip = [0u8; PAGE_SIZE];
        decompress(&compressed, &mut roundtrip).unwrap();
        assert_eq!(page, roundtrip);
        assert!(compressed.len() < PAGE_SIZE);
    }
}
