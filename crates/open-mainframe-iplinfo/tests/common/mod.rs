//! Shared fixtures: synthetic storage laid out like a live PSA→CVT chain.

#![allow(dead_code)]

use std::sync::Mutex;

use open_mainframe_iplinfo::{AddressSpace, AddressingMode, StorageImage, TextEncoding};

pub const CVT_AT: usize = 0x100;
pub const ECVT_AT: usize = 0x300;
pub const IPA_AT: usize = 0x500;
pub const EXT2_AT: usize = 0x600;
pub const DUMP_LEN: usize = EXT2_AT + 8;

/// Values placed into the IPA and CVTEXT2.
pub struct IplFields {
    pub load: &'static str,
    pub parmlib: &'static str,
    pub device: &'static str,
    pub iodf: &'static str,
}

pub const SAMPLE: IplFields = IplFields {
    load: "EC",
    parmlib: "SYS1.PARMLIB(PARMLIB00)  ",
    device: "0742",
    iodf: "01",
};

fn put(buf: &mut [u8], at: usize, width: usize, text: &str, encoding: TextEncoding) {
    let mut bytes = encoding.encode(text);
    bytes.resize(width, encoding.blank());
    buf[at..at + width].copy_from_slice(&bytes);
}

fn put_link(buf: &mut [u8], at: usize, target: usize) {
    buf[at..at + 4].copy_from_slice(&(target as u32).to_be_bytes());
}

/// A flat dump starting at address 0 holding the whole chain.
pub fn flat_dump(fields: &IplFields, encoding: TextEncoding) -> Vec<u8> {
    let mut buf = vec![0u8; DUMP_LEN];
    put_link(&mut buf, 16, CVT_AT);
    put_link(&mut buf, CVT_AT + 140, ECVT_AT);
    put_link(&mut buf, CVT_AT + 328, EXT2_AT);
    put_link(&mut buf, ECVT_AT + 392, IPA_AT);
    put(&mut buf, IPA_AT + 20, 2, fields.load, encoding);
    put(&mut buf, IPA_AT + 48, 44, fields.parmlib, encoding);
    put(&mut buf, IPA_AT + 92, 4, fields.device, encoding);
    put(&mut buf, EXT2_AT + 6, 2, fields.iodf, encoding);
    buf
}

/// The sample chain in EBCDIC, rooted at address 0.
pub fn sample_image() -> StorageImage {
    image_from(flat_dump(&SAMPLE, TextEncoding::Ebcdic))
}

pub fn image_from(dump: Vec<u8>) -> StorageImage {
    let mut image = StorageImage::new(AddressingMode::Amode31).with_root(0);
    image.map(0, dump).unwrap();
    image
}

/// Address space that records every read it serves.
pub struct RecordingSpace {
    pub inner: StorageImage,
    pub reads: Mutex<Vec<(u64, usize)>>,
}

impl RecordingSpace {
    pub fn new(inner: StorageImage) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> Vec<(u64, usize)> {
        self.reads.lock().unwrap().clone()
    }
}

impl AddressSpace for RecordingSpace {
    fn limit(&self) -> u64 {
        self.inner.limit()
    }

    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        self.reads.lock().unwrap().push((address, len));
        self.inner.read(address, len)
    }
}
