use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

const MAGIC_NUMBER: u32 = 0x53545248; // "STRH" in hex
const VERSION: u32 = 1;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const RECORD_COUNT_OFFSET: usize = 8;
const RECORDS_OFFSET: usize = 12;

/// Each record maps an index name to its root page id.
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4; // name (32) + root_page_id (4)
const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// View over the header page (page 0). It persists the
/// `index_name -> root_page_id` mapping; nothing else lives on it.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_u32(MAGIC_OFFSET, MAGIC_NUMBER);
        self.set_u32(VERSION_OFFSET, VERSION);
        self.set_u32(RECORD_COUNT_OFFSET, 0);
    }

    pub fn is_valid(&self) -> bool {
        read_u32(self.data, MAGIC_OFFSET) == MAGIC_NUMBER
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    /// Returns the root page id recorded for `name`, if any.
    pub fn find_record(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
    }

    /// Adds a record for a new index. Updates in place if the name is
    /// already present.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> Result<()> {
        if name.len() > NAME_SIZE {
            return Err(StratumError::IndexNameTooLong(name.to_string()));
        }
        if self.update_record(name, root_page_id) {
            return Ok(());
        }

        let count = self.record_count();
        if count >= MAX_RECORDS {
            return Err(StratumError::HeaderFull);
        }

        let offset = RECORDS_OFFSET + count * RECORD_SIZE;
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        self.data[offset + NAME_SIZE..offset + RECORD_SIZE]
            .copy_from_slice(&root_page_id.as_i32().to_le_bytes());
        self.set_u32(RECORD_COUNT_OFFSET, (count + 1) as u32);
        Ok(())
    }

    /// Overwrites the root page id for `name`. Returns false if no record
    /// with that name exists.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        for i in 0..self.record_count() {
            let offset = RECORDS_OFFSET + i * RECORD_SIZE;
            if record_name(self.data, offset) == name.as_bytes() {
                self.data[offset + NAME_SIZE..offset + RECORD_SIZE]
                    .copy_from_slice(&root_page_id.as_i32().to_le_bytes());
                return true;
            }
        }
        false
    }

    fn set_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Read-only view over the header page.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        read_u32(self.data, MAGIC_OFFSET) == MAGIC_NUMBER
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    pub fn find_record(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn record_name(data: &[u8], offset: usize) -> &[u8] {
    let name = &data[offset..offset + NAME_SIZE];
    let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
    &name[..end]
}

fn find_record(data: &[u8], name: &str) -> Option<PageId> {
    let count = read_u32(data, RECORD_COUNT_OFFSET) as usize;
    for i in 0..count {
        let offset = RECORDS_OFFSET + i * RECORD_SIZE;
        if record_name(data, offset) == name.as_bytes() {
            let root = i32::from_le_bytes(
                data[offset + NAME_SIZE..offset + RECORD_SIZE]
                    .try_into()
                    .unwrap(),
            );
            return Some(PageId::new(root));
        }
    }
    None
}
