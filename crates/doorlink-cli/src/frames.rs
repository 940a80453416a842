//! `encode` and `decode` helpers.

use anyhow::{Context, Result, bail, ensure};
use clap::{Args, ValueEnum};
use doorlink_protocol::{Envelope, TextFrame, binary, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Binary,
    Text,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Target encoding.
    #[arg(long, value_enum, default_value_t = Format::Binary)]
    format: Format,

    /// Payload, e.g. '{"type":"command","cmd":"feedback_grant","rdr_id":2,"hub_addr":5}'.
    payload: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes such as "81 06 02 1A 00 00 03 E8 74", or a full text line.
    input: String,
}

pub fn encode(args: &EncodeArgs) -> Result<()> {
    println!("{}", encode_payload(&args.payload, args.format)?);
    Ok(())
}

pub fn decode(args: &DecodeArgs) -> Result<()> {
    println!("{}", decode_input(&args.input)?);
    Ok(())
}

fn encode_payload(payload: &str, format: Format) -> Result<String> {
    let envelope = text::decode(&TextFrame::new(payload.to_string()))
        .context("payload is not a valid message")?;

    match format {
        Format::Binary => {
            let frame = binary::encode_to_bytes(&envelope.message)?;
            Ok(to_hex(&frame))
        }
        Format::Text => Ok(text::encode_line(&envelope)?.trim_end().to_string()),
    }
}

fn decode_input(input: &str) -> Result<String> {
    let input = input.trim();
    if input.starts_with('<') {
        let envelope: Envelope = text::decode_line(input)?;
        return Ok(envelope.to_string());
    }

    let bytes = parse_hex(input)?;
    match binary::decode_bytes(&bytes)? {
        Some(message) => Ok(message.to_string()),
        None => Ok("idle".to_string()),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);

    ensure!(
        digits.bytes().all(|b| b.is_ascii_hexdigit()),
        "hex input may only contain 0-9 and A-F"
    );
    if digits.is_empty() || digits.len() % 2 != 0 {
        bail!("expected an even number of hex digits");
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("hex input is not ASCII")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("invalid hex byte '{pair}'"))
        })
        .collect()
}
