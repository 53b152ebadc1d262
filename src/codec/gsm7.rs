// ABOUTME: GSM 03.38 septet packing for the 7-bit default alphabet user data
// ABOUTME: Packs characters (masked to 7 bits) little-endian into octets and unpacks them back

/// Mask a character down to the 7-bit value sent on the wire.
fn septet(c: char) -> u8 {
    (c as u32 & 0x7F) as u8
}

/// Pack text into GSM 7-bit user data.
///
/// Each character is masked to 7 bits. Septet `i` starts at bit `7 * i` of the
/// output, least significant bit first, so eight characters fill seven octets.
/// A trailing partially filled octet is always emitted.
///
/// ```
/// use sim800::codec::gsm7;
///
/// assert_eq!(gsm7::pack("A"), vec![0x41]);
/// assert_eq!(gsm7::pack_hex("hellohello"), "E8329BFD4697D9EC37");
/// ```
pub fn pack(text: &str) -> Vec<u8> {
    let septets: Vec<u8> = text.chars().map(septet).collect();
    pack_septets(&septets)
}

/// Pack already masked septet values.
pub fn pack_septets(septets: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packed_len(septets.len()));
    let mut acc: u16 = 0;
    let mut bits = 0u32;

    for &value in septets {
        acc |= u16::from(value & 0x7F) << bits;
        bits += 7;
        if bits >= 8 {
            out.push((acc & 0xFF) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }

    if bits > 0 {
        out.push((acc & 0xFF) as u8);
    }
    out
}

/// Pack text and render the octets as upper-case hex.
pub fn pack_hex(text: &str) -> String {
    super::to_hex(&pack(text))
}

/// Number of octets needed for `septets` packed septets.
pub fn packed_len(septets: usize) -> usize {
    (septets * 7).div_ceil(8)
}

/// Unpack `count` septets from packed user data.
///
/// Stops early if `octets` runs out.
pub fn unpack(octets: &[u8], count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count);
    let mut acc: u16 = 0;
    let mut bits = 0u32;

    for &octet in octets {
        acc |= u16::from(octet) << bits;
        bits += 8;
        while bits >= 7 && out.len() < count {
            out.push((acc & 0x7F) as u8);
            acc >>= 7;
            bits -= 7;
        }
        if out.len() == count {
            break;
        }
    }
    out
}

/// Unpack septets and map them back to ASCII characters.
pub fn unpack_text(octets: &[u8], count: usize) -> String {
    unpack(octets, count).into_iter().map(char::from).collect()
}
