mod address;
mod data_coding;
mod sms_submit;
mod type_of_address;

pub use address::{Address, MAX_ADDRESS_DIGITS, decode_phone_digits, encode_phone_number};
pub use data_coding::DataCoding;
pub use sms_submit::{EncodedPdu, SmsSubmit, encode_pdu};
pub use type_of_address::TypeOfAddress;
