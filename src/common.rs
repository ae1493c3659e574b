pub type TableId = u32;
pub type PageNo = u32;
pub type Slot = u16;
pub type PageId = (TableId, PageNo);
/// Physical locator of a tuple: the page it lives on and its slot within that page.
pub type RecordId = (PageId, Slot);

pub const INVALID_TABLE_ID: TableId = 0;
pub const INVALID_PAGE_NO: PageNo = PageNo::MAX;
pub const INVALID_PAGE_ID: PageId = (INVALID_TABLE_ID, INVALID_PAGE_NO);
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of bytes a string value may occupy
pub const STRING_LEN: usize = 128;
