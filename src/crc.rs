use crate::consts::RADIO_CRC_RESIDUAL;

/// Initial value of the running frame CRC.
pub(crate) const CRC_INIT: u16 = 0xffff;

pub(crate) fn crc_ccitt_update(crc: u16, data: u8) -> u16 {
    let mut d = u16::from(data);
    d ^= lo8(crc);
    d ^= d << 4;
    d = lo8(d); // keep only the low byte for the fold below

    ((d << 8) | hi8(crc)) ^ lo8(d >> 4) ^ (d << 3)
}

/// Runs the CRC over `bytes`, starting from [`CRC_INIT`].
pub(crate) fn crc_ccitt(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(CRC_INIT, |crc, &b| crc_ccitt_update(crc, b))
}

/// True when `frame` (length, header, payload and trailer) carries a correct trailer.
pub(crate) fn frame_crc_ok(frame: &[u8]) -> bool {
    crc_ccitt(frame) == RADIO_CRC_RESIDUAL
}

pub(crate) fn lo8(x: u16) -> u16 {
    x & 0xff
}

pub(crate) fn hi8(x: u16) -> u16 {
    x >> 8
}
