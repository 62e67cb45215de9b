//! Battle and copy messages for 20th-anniversary devices.
//!
//! Every field is four hex digits. Monster ids and powers travel multiplied
//! by four so the low two bits of their digit group stay clear; most fields
//! end in the `e` filler digit.

use serde::{Deserialize, Serialize};

use super::checksum::{self, FIELD_LEN, MESSAGE_FIELDS};
use crate::models::error::ModemError;
use crate::models::partition::MAX_PARTITIONS;
use crate::models::state::ExchangeRole;

const EMPTY_FIELD: &str = "000e";

/// 20th-anniversary device generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceModel {
    Original,
    Pendulum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub id: u32,
    pub power: u32,
}

/// Inputs to a battle message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSetup {
    /// Player name characters, Original devices only.
    pub player_ids: [u32; 4],
    pub monster: Monster,
    /// Second monster for a 2-vs-2 battle.
    pub second_monster: Option<Monster>,
    pub computer_wins: bool,
}

/// What the opponent revealed in a completed 20-partition exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentInfo {
    pub monster_id: u32,
    pub monster_power: u32,
    pub monster2_id: u32,
    pub monster2_power: u32,
    pub battle_power: u32,
    pub device_version: u32,
    /// Player name characters; Pendulum devices do not send one.
    pub username: Option<[u32; 4]>,
}

fn scaled(value: u32, what: &str, max: u32) -> Result<u32, ModemError> {
    match value.checked_mul(4) {
        Some(v) if v <= max => Ok(v),
        _ => Err(ModemError::InvalidArgument(format!("{} {} out of range", what, value))),
    }
}

fn monster_id_field(id: u32) -> Result<String, ModemError> {
    Ok(format!("{:03x}e", scaled(id, "monster id", 0xfff)?))
}

fn monster_power_field(power: u32) -> Result<String, ModemError> {
    Ok(format!("0{:02x}e", scaled(power, "monster power", 0xff)?))
}

fn player_id_hex(id: u32) -> Result<String, ModemError> {
    if id > 0xff {
        return Err(ModemError::InvalidArgument(format!("player id {} out of range", id)));
    }
    Ok(format!("{:02x}", id))
}

fn verdict(computer_wins: bool) -> &'static str {
    if computer_wins {
        "0fe"
    } else {
        "f0e"
    }
}

fn fill_empty(message: &mut Vec<String>, count: usize) {
    message.extend(std::iter::repeat(EMPTY_FIELD.to_string()).take(count));
}

/// Bits `[start, end)` of a 16-bit hex field, counted from the most significant bit.
pub fn extract_lsb_value(hex: &str, start: usize, end: usize) -> Result<u32, ModemError> {
    if start >= end || end > 16 {
        return Err(ModemError::InvalidArgument(format!("bad bit range {}..{}", start, end)));
    }
    let value = u32::from_str_radix(hex, 16)
        .ok()
        .filter(|v| *v <= 0xffff)
        .ok_or_else(|| ModemError::InvalidArgument(format!("not a 16-bit hex field: {:?}", hex)))?;
    let width = end - start;
    Ok((value >> (16 - end)) & ((1 << width) - 1))
}

impl DeviceModel {
    /// Ten-field battle message. With `no_real_battle` the verdict field is
    /// replaced (Pendulum) or omitted (Original).
    pub fn battle_message(
        &self,
        setup: &BattleSetup,
        role: ExchangeRole,
        no_real_battle: bool,
    ) -> Result<Vec<String>, ModemError> {
        let prefix = if role.is_sender() { "8" } else { "0" };
        let double = setup.second_monster.is_some();
        let mut message = Vec::with_capacity(MESSAGE_FIELDS);

        match self {
            DeviceModel::Original => {
                let ids = setup
                    .player_ids
                    .iter()
                    .map(|&id| player_id_hex(id))
                    .collect::<Result<Vec<_>, _>>()?;
                message.push(format!("{}{}", ids[1], ids[0]));
                message.push(format!("{}{}", ids[3], ids[2]));
                message.push(format!("{}{}", prefix, if double { "22e" } else { "02e" }));
                message.push(monster_id_field(setup.monster.id)?);
                message.push(EMPTY_FIELD.to_string());
                message.push(monster_power_field(setup.monster.power)?);
                match setup.second_monster {
                    Some(second) => {
                        message.push(monster_id_field(second.id)?);
                        message.push(EMPTY_FIELD.to_string());
                        message.push(monster_power_field(second.power)?);
                    }
                    None => fill_empty(&mut message, 3),
                }
                if !no_real_battle {
                    message.push(format!("0{}", verdict(setup.computer_wins)));
                    checksum::apply_checksum(&mut message)?;
                }
            }
            DeviceModel::Pendulum => {
                message.push(format!("{}{}", prefix, if double { "27e" } else { "07e" }));
                message.push(monster_id_field(setup.monster.id)?);
                message.push("049e".to_string());
                message.push("048e".to_string());
                message.push(monster_power_field(setup.monster.power)?);
                match setup.second_monster {
                    Some(second) => {
                        message.push(monster_id_field(second.id)?);
                        fill_empty(&mut message, 2);
                        message.push(monster_power_field(second.power)?);
                    }
                    None => fill_empty(&mut message, 4),
                }
                if no_real_battle {
                    message.push("ff00".to_string());
                } else {
                    // Pendulum devices checksum a fixed "100" tail, not the verdict.
                    message.push("0100".to_string());
                    let checksum = checksum::checksum_nibble(&message)?;
                    message[MESSAGE_FIELDS - 1] = format!("{}{}", checksum, verdict(setup.computer_wins));
                }
            }
        }
        log::debug!("{:?} battle message: {}", self, message.join(" "));
        Ok(message)
    }

    /// Ten-field message that makes the peer copy monster `monster_id`.
    pub fn copy_message(&self, monster_id: u32) -> Result<Vec<String>, ModemError> {
        let (head, tail): (&[&str], &[&str]) = match self {
            DeviceModel::Original => (&["0000", "0000", "812e"][..], &["959e", "00fe"][..]),
            DeviceModel::Pendulum => (&["0101", "0101", "817e"][..], &[EMPTY_FIELD, EMPTY_FIELD][..]),
        };
        let mut message: Vec<String> = head.iter().map(|s| s.to_string()).collect();
        message.push(monster_id_field(monster_id)?);
        message.extend(tail.iter().map(|s| s.to_string()));
        let remaining = MESSAGE_FIELDS - message.len();
        fill_empty(&mut message, remaining);
        checksum::apply_checksum(&mut message)?;
        Ok(message)
    }

    /// Read the opponent's monsters out of a completed exchange.
    ///
    /// `messages` holds every detected partition; the sender transmits
    /// first, so the opponent's fields sit at odd indices for a sender and
    /// even indices for a receiver.
    pub fn opponent_info<S: AsRef<str>>(&self, messages: &[S], role: ExchangeRole) -> Result<OpponentInfo, ModemError> {
        if messages.len() < MAX_PARTITIONS - 2 {
            return Err(ModemError::InvalidArgument(format!(
                "exchange has only {} partitions",
                messages.len()
            )));
        }
        if let Some(bad) = messages.iter().map(AsRef::as_ref).find(|m| m.len() != FIELD_LEN) {
            return Err(ModemError::InvalidArgument(format!("malformed partition {:?}", bad)));
        }
        let offset = if role.is_sender() { 1 } else { 0 };
        let field = |index: usize, start: usize, end: usize| extract_lsb_value(messages[index + offset].as_ref(), start, end);

        let info = match self {
            DeviceModel::Original => OpponentInfo {
                monster_id: field(6, 0, 10)?,
                monster_power: field(10, 4, 12)?,
                monster2_id: field(12, 0, 10)?,
                monster2_power: field(16, 4, 12)?,
                battle_power: field(4, 1, 6)?,
                device_version: field(4, 10, 12)?,
                username: Some([field(0, 8, 16)?, field(0, 0, 8)?, field(2, 8, 16)?, field(2, 0, 8)?]),
            },
            DeviceModel::Pendulum => OpponentInfo {
                monster_id: field(2, 2, 10)?,
                monster_power: field(8, 4, 12)?,
                monster2_id: field(10, 2, 10)?,
                monster2_power: field(16, 4, 12)?,
                battle_power: field(0, 2, 6)?,
                device_version: field(4, 8, 12)?,
                username: None,
            },
        };
        Ok(info)
    }
}
