use num_enum::TryFromPrimitive;

/// Type-of-address octet of a destination address
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeOfAddress {
    /// ISDN/telephony numbering plan, unknown type of number
    Unknown = 0b1000_0001,
    /// ISDN/telephony numbering plan, international number (leading `+`)
    International = 0b1001_0001,
}

impl TypeOfAddress {
    /// `International` when the number carries a leading `+`
    pub fn for_number(number: &str) -> Self {
        if number.starts_with('+') {
            TypeOfAddress::International
        } else {
            TypeOfAddress::Unknown
        }
    }
}
