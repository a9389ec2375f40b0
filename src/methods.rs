//! Kelvin (NV2A 3D) class and method offsets that the converter
//! treats specially.

/// The primary graphics-state object. Methods on any other class are
/// passed through opaquely.
pub const NV20_KELVIN_PRIMITIVE: u32 = 0x97;

pub const NV097_NO_OPERATION: u32 = 0x0100;
pub const NV097_WAIT_FOR_IDLE: u32 = 0x0110;
pub const NV097_SET_FLIP_READ: u32 = 0x0120;
pub const NV097_FLIP_INCREMENT_WRITE: u32 = 0x012c;
pub const NV097_FLIP_STALL: u32 = 0x0130;
pub const NV097_BREAK_VERTEX_BUFFER_CACHE: u32 = 0x1710;
pub const NV097_CLEAR_REPORT_VALUE: u32 = 0x17c8;
pub const NV097_GET_REPORT: u32 = 0x17d0;
pub const NV097_SET_BEGIN_END: u32 = 0x17fc;
pub const NV097_BACK_END_WRITE_SEMAPHORE_RELEASE: u32 = 0x1d70;

// Methods carrying GPU memory offsets
pub const NV097_SET_SURFACE_COLOR_OFFSET: u32 = 0x0210;
pub const NV097_SET_SURFACE_ZETA_OFFSET: u32 = 0x0214;
pub const NV097_SET_VERTEX_DATA_ARRAY_OFFSET: u32 = 0x1720;
pub const NV097_SET_TEXTURE_OFFSET: u32 = 0x1b00;

pub const VERTEX_DATA_ARRAY_COUNT: u32 = 16;
pub const VERTEX_DATA_ARRAY_STRIDE: u32 = 4;
pub const TEXTURE_STAGE_COUNT: u32 = 4;
pub const TEXTURE_STAGE_STRIDE: u32 = 0x40;

/// Kelvin methods which never leave persistent state behind
/// (synchronisation, flips, reports and the begin/end toggle).
pub const STATELESS_METHODS: [u32; 9] = [
    NV097_NO_OPERATION,
    NV097_WAIT_FOR_IDLE,
    NV097_SET_FLIP_READ,
    NV097_FLIP_INCREMENT_WRITE,
    NV097_FLIP_STALL,
    NV097_BREAK_VERTEX_BUFFER_CACHE,
    NV097_GET_REPORT,
    NV097_SET_BEGIN_END,
    NV097_BACK_END_WRITE_SEMAPHORE_RELEASE,
];

pub fn is_stateless_method(method: u32) -> bool {
    STATELESS_METHODS.contains(&method)
}

/// Return true if offset falls on element index of the array
/// base, base + stride, ... (count elements).
fn is_array_element(method: u32, base: u32, stride: u32, count: u32) -> bool {
    method >= base && method < base + stride * count && (method - base) % stride == 0
}

/// Kelvin methods whose parameter is a memory offset that only makes
/// sense inside the captured application, or (for the report clear)
/// which fault when replayed without the state that preceded them.
pub fn is_non_portable_method(method: u32) -> bool {
    match method {
        NV097_SET_SURFACE_COLOR_OFFSET
        | NV097_SET_SURFACE_ZETA_OFFSET
        | NV097_CLEAR_REPORT_VALUE => true,
        _ => {
            is_array_element(
                method,
                NV097_SET_TEXTURE_OFFSET,
                TEXTURE_STAGE_STRIDE,
                TEXTURE_STAGE_COUNT,
            ) || is_array_element(
                method,
                NV097_SET_VERTEX_DATA_ARRAY_OFFSET,
                VERTEX_DATA_ARRAY_STRIDE,
                VERTEX_DATA_ARRAY_COUNT,
            )
        }
    }
}
