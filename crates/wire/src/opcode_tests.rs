use super::*;

#[test]
fn round_trips_through_byte() {
    assert_eq!(Opcode::try_from(0x00), Ok(Opcode::Noop));
    assert_eq!(Opcode::try_from(0xFF), Ok(Opcode::Exit));
    assert_eq!(Opcode::Hello as u8, 0xFE);
}

#[test]
fn unknown_byte_is_rejected() {
    assert_eq!(Opcode::try_from(0x05), Err(0x05));
}

#[test]
fn categories_match_the_opcode_family_table() {
    assert_eq!(Opcode::Read.category(), OpcodeCategory::Fs);
    assert_eq!(Opcode::Write.category(), OpcodeCategory::Fs);
    assert_eq!(Opcode::Spawn.category(), OpcodeCategory::Lifecycle);
    assert_eq!(Opcode::Store.category(), OpcodeCategory::State);
}

#[test]
fn from_name_round_trips_with_name() {
    for op in ALL_OPCODES {
        assert_eq!(Opcode::from_name(op.name()), Some(*op));
    }
    assert_eq!(Opcode::from_name("NOT_AN_OPCODE"), None);
}
