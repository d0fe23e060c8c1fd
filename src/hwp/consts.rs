//! Constants for the binary HWP 5.x format.

/// Fixed signature at the head of the `FileHeader` stream (32 bytes, NUL padded).
pub const FILE_HEADER_SIGNATURE: &[u8] = b"HWP Document File";
/// Length of the signature field.
pub const FILE_HEADER_SIGNATURE_LEN: usize = 32;

// ── DocInfo record tags ─────────────────────────────────────────

pub const HWPTAG_DOCUMENT_PROPERTIES: u16 = 16;
pub const HWPTAG_ID_MAPPINGS: u16 = 17;
pub const HWPTAG_BIN_DATA: u16 = 18;
pub const HWPTAG_FACE_NAME: u16 = 19;
pub const HWPTAG_BORDER_FILL: u16 = 20;
pub const HWPTAG_CHAR_SHAPE: u16 = 21;
pub const HWPTAG_TAB_DEF: u16 = 22;
pub const HWPTAG_NUMBERING: u16 = 23;
pub const HWPTAG_BULLET: u16 = 24;
pub const HWPTAG_PARA_SHAPE: u16 = 25;
pub const HWPTAG_STYLE: u16 = 26;

// ── BodyText record tags ────────────────────────────────────────

pub const HWPTAG_PARA_HEADER: u16 = 66;
pub const HWPTAG_PARA_TEXT: u16 = 67;
pub const HWPTAG_PARA_CHAR_SHAPE: u16 = 68;
pub const HWPTAG_PARA_LINE_SEG: u16 = 69;
pub const HWPTAG_CTRL_HEADER: u16 = 71;
pub const HWPTAG_LIST_HEADER: u16 = 72;
/// Section definition; its payload carries the page geometry.
pub const HWPTAG_SEC_DEF: u16 = 73;
pub const HWPTAG_COLUMN_DEF: u16 = 74;
pub const HWPTAG_TABLE: u16 = 75;
pub const HWPTAG_CELL_DEF: u16 = 77;
pub const HWPTAG_SHAPE_COMPONENT_PICTURE: u16 = 84;

// ── Control ids (first u32 of a CTRL_HEADER payload) ────────────
//
// Stored so that a little-endian read yields the four ASCII bytes in
// big-endian order.

pub const CTRL_ID_TABLE: u32 = u32::from_be_bytes(*b"tbl ");
pub const CTRL_ID_SECTION: u32 = u32::from_be_bytes(*b"secd");
pub const CTRL_ID_COLUMN: u32 = u32::from_be_bytes(*b"cold");
pub const CTRL_ID_SHAPE_OBJECT: u32 = u32::from_be_bytes(*b"gso ");

// ── Inline text control code units (UTF-16LE) ───────────────────

/// Field start; inline control with seven trailing code units.
pub const CHAR_FIELD_START: u16 = 0x0003;
/// Field end; inline control with seven trailing code units.
pub const CHAR_FIELD_END: u16 = 0x0004;
/// Tab.
pub const CHAR_TAB: u16 = 0x0009;
/// Forced line break.
pub const CHAR_LINE_BREAK: u16 = 0x000A;
/// Paragraph break; paragraphs are already split at record level.
pub const CHAR_PARA_BREAK: u16 = 0x000D;
/// Non-breaking space.
pub const CHAR_NB_SPACE: u16 = 0x001E;
/// Fixed-width space.
pub const CHAR_FW_SPACE: u16 = 0x001F;

/// Code units 0x0001..=0x0008 are inline controls carrying this many extra
/// UTF-16 code units of payload.
pub const INLINE_CTRL_EXTRA_UNITS: usize = 7;

/// Record header size bits: a size of 0xFFF means a 4-byte extended size
/// field follows the header word.
pub const RECORD_SIZE_EXTENDED: u32 = 0xFFF;
