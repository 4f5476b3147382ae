// File framing
/// Optional prefix of raw files written by newer CORSIKA versions
pub const MAGIC_NUMBER: u32 = 0x5994;
/// Start of every EventIO object (little endian)
pub const SYNC_MARKER: u32 = 0xd41f8a37;
/// Fortran record length word (21 sub-blocks of 273 words) scattered through raw files
pub const RAW_FILLER: u32 = 22932;

// Raw sync tags, ASCII read as little endian u32
pub const TAG_RUNH: u32 = 1213093202;
pub const TAG_RUNE: u32 = 1162761554;
pub const TAG_EVTH: u32 = 1213486661;
pub const TAG_EVTE: u32 = 1163155013;

// Block type codes (EventIO numbering, reused for raw blocks)
pub const TYPE_RUN_HEADER: u16 = 1200;
pub const TYPE_TELESCOPE_POSITIONS: u16 = 1201;
pub const TYPE_EVENT_HEADER: u16 = 1202;
pub const TYPE_ARRAY_OFFSETS: u16 = 1203;
pub const TYPE_TELESCOPE_ARRAY: u16 = 1204;
pub const TYPE_PHOTON_BUNCHES: u16 = 1205;
pub const TYPE_EVENT_END: u16 = 1209;
pub const TYPE_RUN_END: u16 = 1210;
pub const TYPE_RAW_PAYLOAD: u16 = 1105;

// Sizes
pub const WORD_SIZE: u64 = 4;
pub const BLOCK_WORDS: usize = 272;
pub const BLOCK_SIZE: u32 = (BLOCK_WORDS as u32) * 4;
pub const SUB_BLOCK_SIZE: u64 = 273 * WORD_SIZE;
pub const MAX_TRAILER_STRIDES: u64 = 21;
pub const RUN_END_WORDS: usize = 2;
pub const EVENTIO_RUNE_SIZE: u64 = 32;
pub const EVENTIO_RUNE_LENGTH: u32 = 16;
pub const EVENTIO_LEGACY_BYTES: u32 = 8;
pub const EVENTIO_SUB_HEADER_SIZE: i64 = 12;

// EventIO header bit fields
pub const TYPE_MASK: u32 = 0xFFFF;
pub const VERSION_MASK: u32 = 0xFFF00000;
pub const VERSION_SHIFT: u32 = 20;
pub const LENGTH_MASK: u32 = 0x3FFFFFFF;

/// Maximum number of reuses of a single shower
pub const MAX_REUSE: usize = 20;
/// Divisor separating array and telescope index in a photon bunch identifier
pub const TELESCOPE_ID_DIVISOR: u32 = 1000;

/// Decompressed size above which holding a gzip input in memory is worth a warning
pub const GZIP_MEMORY_WARN_SIZE: u64 = 1 << 30;
