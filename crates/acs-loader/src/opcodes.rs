//! Legacy opcode table.
//!
//! One [`Descriptor`] per legacy opcode value. Both the tracer and the
//! translator go through [`decode`] and [`expand`], so the size of an
//! instruction and the words it turns into are computed by the same code in
//! both passes.

use acs_core::bytecode::{CallFunc, Op, ThingProp};
use acs_core::{ByteReader, COMPRESSED_OP_THRESHOLD};
use smallvec::SmallVec;

/* ─────────────────────────── Descriptors ─────────────────────────── */

/// Encoded size rule of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Always 4 bytes.
    Word,
    /// 1 byte in the compressed dialect, 4 otherwise.
    Compact,
    /// Always 1 byte.
    Byte,
    /// 2 bytes in the compressed dialect, 4 otherwise.
    CompactShort,
    /// 4-byte branch target (byte offset), rewritten by the jump fixup.
    Jump,
}

/// How a legacy instruction is rewritten into internal words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `op, operand…`
    Direct(Op),
    /// `LineSpec, spec, argc`
    LineSpec(u32),
    /// `LineSpecImm, spec, argc, arg…`
    LineSpecImm(u32),
    /// `LineSpecResult, spec, argc`
    LineSpecResult(u32),
    /// Byte count then that many bytes: `PushImms, n, value…`
    PushList,
    /// `n` bytes: `PushImms, n, value…`
    PushN(u32),
    /// Property of the activator: `PushImm, 0, GetThingVar, prop`
    ActivatorProp(ThingProp),
    /// Property of the actor whose TID is on the stack: `GetThingVar, prop`
    ActorProp(ThingProp),
    /// Native call, arguments on the stack: `CallFunc, argc, func`
    CallFunc(CallFunc, u32),
    /// Native call, immediate arguments: `CallFuncImm, func, argc, arg…`
    CallFuncImm(CallFunc, u32),
    /// Extended call by legacy function number, see [`ext_call`].
    ExtCall,
    /// 4-byte aligned `count, (value, target)×count`: `BranchTable, count, …`
    CaseTable,
}

/// Static description of one legacy opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Legacy mnemonic.
    pub name: &'static str,
    /// Translation rule.
    pub shape: Shape,
    /// Fixed operands, in stream order.
    pub operands: &'static [Operand],
}

const fn d(name: &'static str, op: Op, operands: &'static [Operand]) -> Descriptor {
    Descriptor { name, shape: Shape::Direct(op), operands }
}

const fn s(name: &'static str, shape: Shape, operands: &'static [Operand]) -> Descriptor {
    Descriptor { name, shape, operands }
}

use Operand::{Byte as B, Compact as C, CompactShort as H, Jump as J, Word as W};

const NONE: &[Operand] = &[];

/// Legacy opcode values, sorted.
const LEGACY: &[(u32, Descriptor)] = &[
    (0, d("NOP", Op::Nop, NONE)),
    (1, d("TERMINATE", Op::Terminate, NONE)),
    (2, d("SUSPEND", Op::Suspend, NONE)),
    (3, d("PUSHNUMBER", Op::PushImm, &[W])),
    (4, s("LSPEC1", Shape::LineSpec(1), &[C])),
    (5, s("LSPEC2", Shape::LineSpec(2), &[C])),
    (6, s("LSPEC3", Shape::LineSpec(3), &[C])),
    (7, s("LSPEC4", Shape::LineSpec(4), &[C])),
    (8, s("LSPEC5", Shape::LineSpec(5), &[C])),
    (9, s("LSPEC1DIRECT", Shape::LineSpecImm(1), &[C, W])),
    (10, s("LSPEC2DIRECT", Shape::LineSpecImm(2), &[C, W, W])),
    (11, s("LSPEC3DIRECT", Shape::LineSpecImm(3), &[C, W, W, W])),
    (12, s("LSPEC4DIRECT", Shape::LineSpecImm(4), &[C, W, W, W, W])),
    (13, s("LSPEC5DIRECT", Shape::LineSpecImm(5), &[C, W, W, W, W, W])),
    (14, d("ADD", Op::Add, NONE)),
    (15, d("SUBTRACT", Op::Sub, NONE)),
    (16, d("MULTIPLY", Op::Mul, NONE)),
    (17, d("DIVIDE", Op::Div, NONE)),
    (18, d("MODULUS", Op::Mod, NONE)),
    (19, d("EQ", Op::CmpEq, NONE)),
    (20, d("NE", Op::CmpNe, NONE)),
    (21, d("LT", Op::CmpLt, NONE)),
    (22, d("GT", Op::CmpGt, NONE)),
    (23, d("LE", Op::CmpLe, NONE)),
    (24, d("GE", Op::CmpGe, NONE)),
    (25, d("ASSIGNSCRIPTVAR", Op::SetLocalVar, &[C])),
    (26, d("ASSIGNMAPVAR", Op::SetMapVar, &[C])),
    (27, d("ASSIGNWORLDVAR", Op::SetWorldVar, &[C])),
    (28, d("PUSHSCRIPTVAR", Op::GetLocalVar, &[C])),
    (29, d("PUSHMAPVAR", Op::GetMapVar, &[C])),
    (30, d("PUSHWORLDVAR", Op::GetWorldVar, &[C])),
    (31, d("ADDSCRIPTVAR", Op::AddLocalVar, &[C])),
    (32, d("ADDMAPVAR", Op::AddMapVar, &[C])),
    (33, d("ADDWORLDVAR", Op::AddWorldVar, &[C])),
    (34, d("SUBSCRIPTVAR", Op::SubLocalVar, &[C])),
    (35, d("SUBMAPVAR", Op::SubMapVar, &[C])),
    (36, d("SUBWORLDVAR", Op::SubWorldVar, &[C])),
    (37, d("MULSCRIPTVAR", Op::MulLocalVar, &[C])),
    (38, d("MULMAPVAR", Op::MulMapVar, &[C])),
    (39, d("MULWORLDVAR", Op::MulWorldVar, &[C])),
    (40, d("DIVSCRIPTVAR", Op::DivLocalVar, &[C])),
    (41, d("DIVMAPVAR", Op::DivMapVar, &[C])),
    (42, d("DIVWORLDVAR", Op::DivWorldVar, &[C])),
    (43, d("MODSCRIPTVAR", Op::ModLocalVar, &[C])),
    (44, d("MODMAPVAR", Op::ModMapVar, &[C])),
    (45, d("MODWORLDVAR", Op::ModWorldVar, &[C])),
    (46, d("INCSCRIPTVAR", Op::IncLocalVar, &[C])),
    (47, d("INCMAPVAR", Op::IncMapVar, &[C])),
    (48, d("INCWORLDVAR", Op::IncWorldVar, &[C])),
    (49, d("DECSCRIPTVAR", Op::DecLocalVar, &[C])),
    (50, d("DECMAPVAR", Op::DecMapVar, &[C])),
    (51, d("DECWORLDVAR", Op::DecWorldVar, &[C])),
    (52, d("GOTO", Op::Branch, &[J])),
    (53, d("IFGOTO", Op::BranchTrue, &[J])),
    (54, d("DROP", Op::Drop, NONE)),
    (55, d("DELAY", Op::Delay, NONE)),
    (56, d("DELAYDIRECT", Op::DelayImm, &[W])),
    (57, s("RANDOM", Shape::CallFunc(CallFunc::Random, 2), NONE)),
    (58, s("RANDOMDIRECT", Shape::CallFuncImm(CallFunc::Random, 2), &[W, W])),
    (59, s("THINGCOUNT", Shape::CallFunc(CallFunc::ThingCount, 2), NONE)),
    (60, s("THINGCOUNTDIRECT", Shape::CallFuncImm(CallFunc::ThingCount, 2), &[W, W])),
    (61, s("TAGWAIT", Shape::CallFunc(CallFunc::TagWait, 1), NONE)),
    (62, s("TAGWAITDIRECT", Shape::CallFuncImm(CallFunc::TagWait, 1), &[W])),
    (63, s("POLYWAIT", Shape::CallFunc(CallFunc::PolyWait, 1), NONE)),
    (64, s("POLYWAITDIRECT", Shape::CallFuncImm(CallFunc::PolyWait, 1), &[W])),
    (65, s("CHANGEFLOOR", Shape::CallFunc(CallFunc::ChangeFloor, 2), NONE)),
    (66, s("CHANGEFLOORDIRECT", Shape::CallFuncImm(CallFunc::ChangeFloor, 2), &[W, W])),
    (67, s("CHANGECEILING", Shape::CallFunc(CallFunc::ChangeCeiling, 2), NONE)),
    (68, s("CHANGECEILINGDIRECT", Shape::CallFuncImm(CallFunc::ChangeCeiling, 2), &[W, W])),
    (69, d("RESTART", Op::Restart, NONE)),
    (70, d("ANDLOGICAL", Op::LogAnd, NONE)),
    (71, d("ORLOGICAL", Op::LogOr, NONE)),
    (72, d("ANDBITWISE", Op::And, NONE)),
    (73, d("ORBITWISE", Op::Or, NONE)),
    (74, d("EORBITWISE", Op::Xor, NONE)),
    (75, d("NEGATELOGICAL", Op::LogNot, NONE)),
    (76, d("LSHIFT", Op::Lsh, NONE)),
    (77, d("RSHIFT", Op::Rsh, NONE)),
    (78, d("UNARYMINUS", Op::Neg, NONE)),
    (79, d("IFNOTGOTO", Op::BranchFalse, &[J])),
    (80, s("LINESIDE", Shape::CallFunc(CallFunc::LineSide, 0), NONE)),
    (81, d("SCRIPTWAIT", Op::ScriptWait, NONE)),
    (82, d("SCRIPTWAITDIRECT", Op::ScriptWaitImm, &[W])),
    (83, s("CLEARLINESPECIAL", Shape::CallFunc(CallFunc::ClearLineSpecial, 0), NONE)),
    (84, d("CASEGOTO", Op::BranchCase, &[W, J])),
    (85, d("BEGINPRINT", Op::StartPrint, NONE)),
    (86, s("ENDPRINT", Shape::CallFunc(CallFunc::EndPrint, 0), NONE)),
    (87, d("PRINTSTRING", Op::PrintString, NONE)),
    (88, d("PRINTNUMBER", Op::PrintInt, NONE)),
    (89, d("PRINTCHARACTER", Op::PrintChar, NONE)),
    (90, s("PLAYERCOUNT", Shape::CallFunc(CallFunc::PlayerCount, 0), NONE)),
    (91, s("GAMETYPE", Shape::CallFunc(CallFunc::GameType, 0), NONE)),
    (92, s("GAMESKILL", Shape::CallFunc(CallFunc::GameSkill, 0), NONE)),
    (93, s("TIMER", Shape::CallFunc(CallFunc::Timer, 0), NONE)),
    (94, s("SECTORSOUND", Shape::CallFunc(CallFunc::SectorSound, 2), NONE)),
    (95, s("AMBIENTSOUND", Shape::CallFunc(CallFunc::AmbientSound, 2), NONE)),
    (96, s("SOUNDSEQUENCE", Shape::CallFunc(CallFunc::SoundSequence, 1), NONE)),
    (97, s("SETLINETEXTURE", Shape::CallFunc(CallFunc::SetLineTexture, 4), NONE)),
    (98, s("SETLINEBLOCKING", Shape::CallFunc(CallFunc::SetLineBlocking, 2), NONE)),
    (99, s("SETLINESPECIAL", Shape::CallFunc(CallFunc::SetLineSpecial, 7), NONE)),
    (100, s("THINGSOUND", Shape::CallFunc(CallFunc::ThingSound, 3), NONE)),
    (101, s("ENDPRINTBOLD", Shape::CallFunc(CallFunc::EndPrintBold, 0), NONE)),
    (102, s("ACTIVATORSOUND", Shape::CallFunc(CallFunc::ActivatorSound, 2), NONE)),
    (103, s("LOCALAMBIENTSOUND", Shape::CallFunc(CallFunc::LocalAmbientSound, 2), NONE)),
    (104, s("SETLINEMONSTERBLOCKING", Shape::CallFunc(CallFunc::SetLineMonsterBlocking, 2), NONE)),
    (120, s("PLAYERHEALTH", Shape::ActivatorProp(ThingProp::Health), NONE)),
    (121, s("PLAYERARMORPOINTS", Shape::ActivatorProp(ThingProp::Armor), NONE)),
    (122, s("PLAYERFRAGS", Shape::ActivatorProp(ThingProp::Frags), NONE)),
    (129, s("LSPEC6", Shape::LineSpec(6), &[C])),
    (130, s("LSPEC6DIRECT", Shape::LineSpecImm(6), &[C, W, W, W, W, W, W])),
    (131, d("PRINTNAME", Op::PrintName, NONE)),
    (135, s("SINGLEPLAYER", Shape::CallFunc(CallFunc::SinglePlayer, 0), NONE)),
    (136, d("FIXEDMUL", Op::MulFixed, NONE)),
    (137, d("FIXEDDIV", Op::DivFixed, NONE)),
    (138, s("SETGRAVITY", Shape::CallFunc(CallFunc::SetGravity, 1), NONE)),
    (139, s("SETGRAVITYDIRECT", Shape::CallFuncImm(CallFunc::SetGravity, 1), &[W])),
    (140, s("SETAIRCONTROL", Shape::CallFunc(CallFunc::SetAirControl, 1), NONE)),
    (141, s("SETAIRCONTROLDIRECT", Shape::CallFuncImm(CallFunc::SetAirControl, 1), &[W])),
    (143, s("GIVEINVENTORY", Shape::CallFunc(CallFunc::GiveInventory, 2), NONE)),
    (144, s("GIVEINVENTORYDIRECT", Shape::CallFuncImm(CallFunc::GiveInventory, 2), &[W, W])),
    (145, s("TAKEINVENTORY", Shape::CallFunc(CallFunc::TakeInventory, 2), NONE)),
    (146, s("TAKEINVENTORYDIRECT", Shape::CallFuncImm(CallFunc::TakeInventory, 2), &[W, W])),
    (147, s("CHECKINVENTORY", Shape::CallFunc(CallFunc::CheckInventory, 1), NONE)),
    (148, s("CHECKINVENTORYDIRECT", Shape::CallFuncImm(CallFunc::CheckInventory, 1), &[W])),
    (149, s("SPAWN", Shape::CallFunc(CallFunc::Spawn, 6), NONE)),
    (150, s("SPAWNDIRECT", Shape::CallFuncImm(CallFunc::Spawn, 6), &[W, W, W, W, W, W])),
    (151, s("SPAWNSPOT", Shape::CallFunc(CallFunc::SpawnSpot, 4), NONE)),
    (152, s("SPAWNSPOTDIRECT", Shape::CallFuncImm(CallFunc::SpawnSpot, 4), &[W, W, W, W])),
    (153, s("SETMUSIC", Shape::CallFunc(CallFunc::SetMusic, 3), NONE)),
    (154, s("SETMUSICDIRECT", Shape::CallFuncImm(CallFunc::SetMusic, 3), &[W, W, W])),
    (155, s("LOCALSETMUSIC", Shape::CallFunc(CallFunc::LocalSetMusic, 3), NONE)),
    (156, s("LOCALSETMUSICDIRECT", Shape::CallFuncImm(CallFunc::LocalSetMusic, 3), &[W, W, W])),
    (157, d("PRINTFIXED", Op::PrintFixed, NONE)),
    (167, d("PUSHBYTE", Op::PushImm, &[B])),
    (168, s("LSPEC1DIRECTB", Shape::LineSpecImm(1), &[B, B])),
    (169, s("LSPEC2DIRECTB", Shape::LineSpecImm(2), &[B, B, B])),
    (170, s("LSPEC3DIRECTB", Shape::LineSpecImm(3), &[B, B, B, B])),
    (171, s("LSPEC4DIRECTB", Shape::LineSpecImm(4), &[B, B, B, B, B])),
    (172, s("LSPEC5DIRECTB", Shape::LineSpecImm(5), &[B, B, B, B, B, B])),
    (173, d("DELAYDIRECTB", Op::DelayImm, &[B])),
    (174, s("RANDOMDIRECTB", Shape::CallFuncImm(CallFunc::Random, 2), &[B, B])),
    (175, s("PUSHBYTES", Shape::PushList, NONE)),
    (176, s("PUSH2BYTES", Shape::PushN(2), &[B, B])),
    (177, s("PUSH3BYTES", Shape::PushN(3), &[B, B, B])),
    (178, s("PUSH4BYTES", Shape::PushN(4), &[B, B, B, B])),
    (179, s("PUSH5BYTES", Shape::PushN(5), &[B, B, B, B, B])),
    (180, s("SETTHINGSPECIAL", Shape::CallFunc(CallFunc::SetThingSpecial, 7), NONE)),
    (181, d("ASSIGNGLOBALVAR", Op::SetGlobalVar, &[C])),
    (182, d("PUSHGLOBALVAR", Op::GetGlobalVar, &[C])),
    (183, d("ADDGLOBALVAR", Op::AddGlobalVar, &[C])),
    (184, d("SUBGLOBALVAR", Op::SubGlobalVar, &[C])),
    (185, d("MULGLOBALVAR", Op::MulGlobalVar, &[C])),
    (186, d("DIVGLOBALVAR", Op::DivGlobalVar, &[C])),
    (187, d("MODGLOBALVAR", Op::ModGlobalVar, &[C])),
    (188, d("INCGLOBALVAR", Op::IncGlobalVar, &[C])),
    (189, d("DECGLOBALVAR", Op::DecGlobalVar, &[C])),
    (196, s("GETACTORX", Shape::ActorProp(ThingProp::X), NONE)),
    (197, s("GETACTORY", Shape::ActorProp(ThingProp::Y), NONE)),
    (198, s("GETACTORZ", Shape::ActorProp(ThingProp::Z), NONE)),
    (203, d("CALL", Op::Call, &[C])),
    (204, d("CALLDISCARD", Op::CallDiscard, &[C])),
    (205, d("RETURNVOID", Op::ReturnVoid, NONE)),
    (206, d("RETURNVAL", Op::ReturnVal, NONE)),
    (207, d("PUSHMAPARRAY", Op::GetMapArr, &[C])),
    (208, d("ASSIGNMAPARRAY", Op::SetMapArr, &[C])),
    (209, d("ADDMAPARRAY", Op::AddMapArr, &[C])),
    (210, d("SUBMAPARRAY", Op::SubMapArr, &[C])),
    (211, d("MULMAPARRAY", Op::MulMapArr, &[C])),
    (212, d("DIVMAPARRAY", Op::DivMapArr, &[C])),
    (213, d("MODMAPARRAY", Op::ModMapArr, &[C])),
    (214, d("INCMAPARRAY", Op::IncMapArr, &[C])),
    (215, d("DECMAPARRAY", Op::DecMapArr, &[C])),
    (216, d("DUP", Op::Dup, NONE)),
    (217, d("SWAP", Op::Swap, NONE)),
    (220, s("SIN", Shape::CallFunc(CallFunc::Sin, 1), NONE)),
    (221, s("COS", Shape::CallFunc(CallFunc::Cos, 1), NONE)),
    (222, s("VECTORANGLE", Shape::CallFunc(CallFunc::VectorAngle, 2), NONE)),
    (223, s("CHECKWEAPON", Shape::CallFunc(CallFunc::CheckWeapon, 1), NONE)),
    (224, s("SETWEAPON", Shape::CallFunc(CallFunc::SetWeapon, 1), NONE)),
    (225, d("TAGSTRING", Op::TagString, NONE)),
    (226, d("PUSHWORLDARRAY", Op::GetWorldArr, &[C])),
    (227, d("ASSIGNWORLDARRAY", Op::SetWorldArr, &[C])),
    (228, d("ADDWORLDARRAY", Op::AddWorldArr, &[C])),
    (229, d("SUBWORLDARRAY", Op::SubWorldArr, &[C])),
    (230, d("MULWORLDARRAY", Op::MulWorldArr, &[C])),
    (231, d("DIVWORLDARRAY", Op::DivWorldArr, &[C])),
    (232, d("MODWORLDARRAY", Op::ModWorldArr, &[C])),
    (233, d("INCWORLDARRAY", Op::IncWorldArr, &[C])),
    (234, d("DECWORLDARRAY", Op::DecWorldArr, &[C])),
    (235, d("PUSHGLOBALARRAY", Op::GetGlobalArr, &[C])),
    (236, d("ASSIGNGLOBALARRAY", Op::SetGlobalArr, &[C])),
    (237, d("ADDGLOBALARRAY", Op::AddGlobalArr, &[C])),
    (238, d("SUBGLOBALARRAY", Op::SubGlobalArr, &[C])),
    (239, d("MULGLOBALARRAY", Op::MulGlobalArr, &[C])),
    (240, d("DIVGLOBALARRAY", Op::DivGlobalArr, &[C])),
    (241, d("MODGLOBALARRAY", Op::ModGlobalArr, &[C])),
    (242, d("INCGLOBALARRAY", Op::IncGlobalArr, &[C])),
    (243, d("DECGLOBALARRAY", Op::DecGlobalArr, &[C])),
    (245, s("SETACTORPROPERTY", Shape::CallFunc(CallFunc::SetActorProperty, 3), NONE)),
    (246, s("GETACTORPROPERTY", Shape::CallFunc(CallFunc::GetActorProperty, 2), NONE)),
    (247, s("PLAYERNUMBER", Shape::ActivatorProp(ThingProp::PlayerNumber), NONE)),
    (248, s("ACTIVATORTID", Shape::ActivatorProp(ThingProp::Tid), NONE)),
    (250, s("GETSCREENWIDTH", Shape::CallFunc(CallFunc::GetScreenW, 0), NONE)),
    (251, s("GETSCREENHEIGHT", Shape::CallFunc(CallFunc::GetScreenH, 0), NONE)),
    (252, s("THING_PROJECTILE2", Shape::CallFunc(CallFunc::ThingProjectile2, 7), NONE)),
    (253, d("STRLEN", Op::StrLen, NONE)),
    (255, s("GETCVAR", Shape::CallFunc(CallFunc::GetCVar, 1), NONE)),
    (256, s("CASEGOTOSORTED", Shape::CaseTable, NONE)),
    (257, d("SETRESULTVALUE", Op::SetResult, NONE)),
    (258, s("GETLINEROWOFFSET", Shape::CallFunc(CallFunc::GetLineRowOffset, 0), NONE)),
    (259, s("GETACTORFLOORZ", Shape::ActorProp(ThingProp::FloorZ), NONE)),
    (260, s("GETACTORANGLE", Shape::ActorProp(ThingProp::Angle), NONE)),
    (261, s("GETSECTORFLOORZ", Shape::CallFunc(CallFunc::GetSectorFloorZ, 3), NONE)),
    (262, s("GETSECTORCEILINGZ", Shape::CallFunc(CallFunc::GetSectorCeilingZ, 3), NONE)),
    (263, s("LSPEC5RESULT", Shape::LineSpecResult(5), &[C])),
    (264, s("GETSIGILPIECES", Shape::ActivatorProp(ThingProp::SigilPieces), NONE)),
    (265, s("GETLEVELINFO", Shape::CallFunc(CallFunc::GetLevelInfo, 1), NONE)),
    (270, s("ENDLOG", Shape::CallFunc(CallFunc::EndLog, 0), NONE)),
    (351, s("CALLFUNC", Shape::ExtCall, &[C, H])),
    (352, d("GOTOSTACK", Op::BranchStack, NONE)),
];

/// One past the highest legacy opcode value.
pub const LEGACY_OP_LIMIT: u32 = 353;

const NO_ENTRY: u16 = u16::MAX;

static INDEX: [u16; LEGACY_OP_LIMIT as usize] = build_index();

const fn build_index() -> [u16; LEGACY_OP_LIMIT as usize] {
    let mut idx = [NO_ENTRY; LEGACY_OP_LIMIT as usize];
    let mut i = 0;
    while i < LEGACY.len() {
        idx[LEGACY[i].0 as usize] = i as u16;
        i += 1;
    }
    idx
}

/// Descriptor of a legacy opcode, `None` for gaps and out-of-range values.
pub fn lookup(opcode: u32) -> Option<&'static Descriptor> {
    let slot = *INDEX.get(opcode as usize)?;
    if slot == NO_ENTRY {
        return None;
    }
    Some(&LEGACY[slot as usize].1)
}

/// Every known legacy opcode with its descriptor.
pub fn known() -> impl Iterator<Item = (u32, &'static Descriptor)> {
    LEGACY.iter().map(|(n, d)| (*n, d))
}

/* ─────────────────────────── Extended calls ─────────────────────────── */

/// What an extended call becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtTarget {
    /// `GetThingVar, prop` (actor TID already on the stack).
    Prop(ThingProp),
    /// `CallFunc, argc, func`
    Func(CallFunc),
}

/// Legacy extended-call numbers: `(number, min argc, max argc, target)`.
const EXT_CALLS: &[(u32, u32, u32, ExtTarget)] = &[
    (9, 1, 1, ExtTarget::Prop(ThingProp::MomX)),
    (10, 1, 1, ExtTarget::Prop(ThingProp::MomY)),
    (11, 1, 1, ExtTarget::Prop(ThingProp::MomZ)),
    (12, 1, 2, ExtTarget::Func(CallFunc::SetActivator)),
    (13, 1, 1, ExtTarget::Func(CallFunc::SetActivatorToTarget)),
    (18, 2, 2, ExtTarget::Func(CallFunc::SetSkyScrollSpeed)),
    (20, 4, 4, ExtTarget::Func(CallFunc::SpawnSpotForced)),
    (21, 3, 3, ExtTarget::Func(CallFunc::SpawnSpotFacingForced)),
    (22, 3, 3, ExtTarget::Func(CallFunc::CheckActorProperty)),
    (23, 6, 6, ExtTarget::Func(CallFunc::SetActorVelocity)),
    (26, 6, 6, ExtTarget::Func(CallFunc::RadiusQuake2)),
    (27, 2, 2, ExtTarget::Func(CallFunc::CheckActorClass)),
    (30, 2, 2, ExtTarget::Func(CallFunc::SoundSequenceOnActor)),
];

/// Resolves an extended call; `None` means the no-op fallback.
pub fn ext_call(number: u32, argc: u32) -> Option<ExtTarget> {
    EXT_CALLS
        .iter()
        .find(|(n, lo, hi, _)| *n == number && (*lo..=*hi).contains(&argc))
        .map(|(_, _, _, t)| *t)
}

/* ─────────────────────────── Decoding ─────────────────────────── */

/// One decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    /// Widened value.
    pub value: u32,
    /// Byte-offset branch target.
    pub jump: bool,
}

impl Arg {
    const fn plain(value: u32) -> Self { Self { value, jump: false } }
}

/// One legacy instruction, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Legacy opcode value.
    pub opcode: u32,
    /// Encoded size in bytes, opcode included.
    pub size: usize,
    /// `None` for an unknown opcode (translated to a single halt).
    pub desc: Option<&'static Descriptor>,
    /// Operands in stream order.
    pub args: SmallVec<[Arg; 8]>,
}

/// Where execution goes after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Falls through to the next instruction.
    Next,
    /// Continues at a byte offset.
    Goto(u32),
    /// Ends the branch.
    Stop,
}

impl Decoded {
    /// Control flow after this instruction. Conditional targets are the
    /// `jump` operands; they are followed in addition to the fall-through.
    pub fn flow(&self) -> Flow {
        let Some(desc) = self.desc else { return Flow::Stop };
        match desc.shape {
            Shape::Direct(Op::Branch) => self.args.first().map_or(Flow::Stop, |a| Flow::Goto(a.value)),
            Shape::Direct(
                Op::Terminate | Op::Restart | Op::ReturnVoid | Op::ReturnVal | Op::BranchStack | Op::Halt,
            ) => Flow::Stop,
            _ => Flow::Next,
        }
    }

    /// Branch targets carried by the operands.
    pub fn jump_targets(&self) -> impl Iterator<Item = u32> + '_ {
        self.args.iter().filter(|a| a.jump).map(|a| a.value)
    }
}

fn read_opcode(r: &mut ByteReader<'_>, compressed: bool) -> Option<u32> {
    if !compressed {
        return r.read_u32_le().ok();
    }
    let b0 = r.read_u8().ok()?;
    if b0 < COMPRESSED_OP_THRESHOLD {
        return Some(u32::from(b0));
    }
    let b1 = r.read_u8().ok()?;
    let hi = u32::from(b0 - COMPRESSED_OP_THRESHOLD);
    Some(u32::from(COMPRESSED_OP_THRESHOLD) + (hi << 8) + u32::from(b1))
}

fn read_operand(r: &mut ByteReader<'_>, kind: Operand, compressed: bool) -> Option<Arg> {
    let value = match kind {
        Operand::Word | Operand::Jump => r.read_u32_le().ok()?,
        Operand::Byte => u32::from(r.read_u8().ok()?),
        Operand::Compact if compressed => u32::from(r.read_u8().ok()?),
        Operand::CompactShort if compressed => u32::from(r.read_u16_le().ok()?),
        Operand::Compact | Operand::CompactShort => r.read_u32_le().ok()?,
    };
    Some(Arg { value, jump: kind == Operand::Jump })
}

/// Decodes the instruction at `addr`.
///
/// Returns `None` when any part of it lies past the end of `data`.
pub fn decode(data: &[u8], addr: usize, compressed: bool) -> Option<Decoded> {
    let mut r = ByteReader::at(data, addr).ok()?;
    let opcode = read_opcode(&mut r, compressed)?;
    let Some(desc) = lookup(opcode) else {
        return Some(Decoded { opcode, size: r.offset() - addr, desc: None, args: SmallVec::new() });
    };

    let mut args = SmallVec::new();
    for kind in desc.operands {
        args.push(read_operand(&mut r, *kind, compressed)?);
    }

    match desc.shape {
        Shape::PushList => {
            let count = r.read_u8().ok()?;
            args.push(Arg::plain(u32::from(count)));
            for b in r.read_bytes(usize::from(count)).ok()? {
                args.push(Arg::plain(u32::from(*b)));
            }
        }
        Shape::CaseTable => {
            let pad = (4 - r.offset() % 4) % 4;
            r.skip(pad).ok()?;
            let count = r.read_u32_le().ok()?;
            // each case is a value and a target
            if (count as usize).checked_mul(8)? > r.remaining() {
                return None;
            }
            args.push(Arg::plain(count));
            for _ in 0..count {
                args.push(Arg::plain(r.read_u32_le().ok()?));
                args.push(Arg { value: r.read_u32_le().ok()?, jump: true });
            }
        }
        _ => {}
    }

    Some(Decoded { opcode, size: r.offset() - addr, desc: Some(desc), args })
}

/* ─────────────────────────── Expansion ─────────────────────────── */

/// Receiver of expanded instruction words.
pub trait CodeSink {
    /// Appends a plain word.
    fn word(&mut self, w: u32);
    /// Appends a byte-offset branch target, to be fixed up later.
    fn jump(&mut self, target: u32);
}

/// Words emitted by an out-of-range opcode.
pub const HALT_WORDS: u32 = 1;

/// Writes the internal words of `ins` into `sink`.
pub fn expand(ins: &Decoded, sink: &mut impl CodeSink) {
    let Some(desc) = ins.desc else {
        sink.word(Op::Halt.word());
        return;
    };
    let args = &ins.args;
    let value = |i: usize| args.get(i).map_or(0, |a| a.value);

    match desc.shape {
        Shape::Direct(op) => {
            sink.word(op.word());
            for a in args {
                if a.jump { sink.jump(a.value) } else { sink.word(a.value) }
            }
        }
        Shape::LineSpec(argc) | Shape::LineSpecResult(argc) => {
            let op = if matches!(desc.shape, Shape::LineSpec(_)) { Op::LineSpec } else { Op::LineSpecResult };
            sink.word(op.word());
            sink.word(value(0));
            sink.word(argc);
        }
        Shape::LineSpecImm(argc) => {
            sink.word(Op::LineSpecImm.word());
            sink.word(value(0));
            sink.word(argc);
            for a in args.iter().skip(1) {
                sink.word(a.value);
            }
        }
        Shape::PushList => {
            sink.word(Op::PushImms.word());
            for a in args {
                sink.word(a.value);
            }
        }
        Shape::PushN(n) => {
            sink.word(Op::PushImms.word());
            sink.word(n);
            for a in args {
                sink.word(a.value);
            }
        }
        Shape::ActivatorProp(prop) => {
            sink.word(Op::PushImm.word());
            sink.word(0);
            sink.word(Op::GetThingVar.word());
            sink.word(prop.word());
        }
        Shape::ActorProp(prop) => {
            sink.word(Op::GetThingVar.word());
            sink.word(prop.word());
        }
        Shape::CallFunc(func, argc) => {
            sink.word(Op::CallFunc.word());
            sink.word(argc);
            sink.word(func.word());
        }
        Shape::CallFuncImm(func, argc) => {
            sink.word(Op::CallFuncImm.word());
            sink.word(func.word());
            sink.word(argc);
            for a in args {
                sink.word(a.value);
            }
        }
        Shape::ExtCall => {
            let (argc, number) = (value(0), value(1));
            match ext_call(number, argc) {
                Some(ExtTarget::Prop(prop)) => {
                    sink.word(Op::GetThingVar.word());
                    sink.word(prop.word());
                }
                Some(ExtTarget::Func(func)) => {
                    sink.word(Op::CallFunc.word());
                    sink.word(argc);
                    sink.word(func.word());
                }
                None => {
                    sink.word(Op::CallFunc.word());
                    sink.word(argc);
                    sink.word(CallFunc::Nop.word());
                }
            }
        }
        Shape::CaseTable => {
            sink.word(Op::BranchTable.word());
            for a in args {
                if a.jump { sink.jump(a.value) } else { sink.word(a.value) }
            }
        }
    }
}

/// Counts words and jump slots instead of storing them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingSink {
    /// Words that would be emitted.
    pub words: usize,
    /// Jump slots among them.
    pub jumps: usize,
}

impl CodeSink for CountingSink {
    fn word(&mut self, _: u32) { self.words += 1; }
    fn jump(&mut self, _: u32) {
        self.words += 1;
        self.jumps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counted(ins: &Decoded) -> CountingSink {
        let mut c = CountingSink::default();
        expand(ins, &mut c);
        c
    }

    #[derive(Default)]
    struct VecSink(Vec<u32>);
    impl CodeSink for VecSink {
        fn word(&mut self, w: u32) { self.0.push(w); }
        fn jump(&mut self, t: u32) { self.0.push(t); }
    }

    fn words(ins: &Decoded) -> Vec<u32> {
        let mut v = VecSink::default();
        expand(ins, &mut v);
        v.0
    }

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in LEGACY.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} / {}", pair[0].1.name, pair[1].1.name);
        }
        assert!(LEGACY.last().is_some_and(|(n, _)| *n < LEGACY_OP_LIMIT));
        assert_eq!(lookup(52).map(|d| d.name), Some("GOTO"));
        assert_eq!(lookup(105), None);
        assert_eq!(lookup(LEGACY_OP_LIMIT), None);
        assert_eq!(lookup(u32::MAX), None);
    }

    #[test]
    fn compressed_opcodes() {
        let data = [14, 240, 16, 241, 95];
        let a = decode(&data, 0, true).unwrap();
        assert_eq!((a.opcode, a.size), (14, 1));
        let b = decode(&data, 1, true).unwrap();
        assert_eq!((b.opcode, b.size), (256, 2));
        let c = decode(&data, 3, true).unwrap();
        assert_eq!(c.opcode, 240 + 256 + 95);
        assert!(c.desc.is_none());
    }

    #[test]
    fn compact_operands_shrink_when_compressed() {
        // ASSIGNMAPVAR 7
        let packed = decode(&[26, 7], 0, true).unwrap();
        assert_eq!(packed.size, 2);
        let wide = decode(&[26, 0, 0, 0, 7, 0, 0, 0], 0, false).unwrap();
        assert_eq!(wide.size, 8);
        assert_eq!(words(&packed), words(&wide));
        assert_eq!(words(&wide), vec![Op::SetMapVar.word(), 7]);
    }

    #[test]
    fn push_bytes_list() {
        let ins = decode(&[175, 3, 9, 8, 7, 99], 0, true).unwrap();
        assert_eq!(ins.size, 5);
        assert_eq!(words(&ins), vec![Op::PushImms.word(), 3, 9, 8, 7]);
    }

    #[test]
    fn case_table_is_aligned_from_lump_start() {
        // opcode at 1 (2 bytes) ends at 3, one pad byte, count at 4
        let mut data = vec![0, 240, 16, 0xAA];
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(&40u32.to_le_bytes());
        let ins = decode(&data, 1, true).unwrap();
        assert_eq!(ins.size, data.len() - 1);
        assert_eq!(ins.jump_targets().collect::<Vec<_>>(), vec![40]);
        assert_eq!(counted(&ins), CountingSink { words: 4, jumps: 1 });
        assert_eq!(words(&ins), vec![Op::BranchTable.word(), 1, 5, 40]);
    }

    #[test]
    fn oversized_case_count_is_rejected() {
        // CASEGOTOSORTED, uncompressed
        let mut wide = 256u32.to_le_bytes().to_vec();
        wide.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(decode(&wide, 0, false).is_none());
    }

    #[test]
    fn activator_props_expand_to_four_words() {
        let ins = decode(&120u32.to_le_bytes(), 0, false).unwrap();
        assert_eq!(
            words(&ins),
            vec![Op::PushImm.word(), 0, Op::GetThingVar.word(), ThingProp::Health.word()]
        );
    }

    #[test]
    fn ext_calls() {
        // CALLFUNC argc=1 func=10, compressed: 2-byte opcode, byte argc, short func
        let data = [240, 111, 1, 10, 0];
        let ins = decode(&data, 0, true).unwrap();
        assert_eq!(ins.size, 5);
        assert_eq!(words(&ins), vec![Op::GetThingVar.word(), ThingProp::MomY.word()]);

        let data = [240, 111, 2, 27, 0];
        let ins = decode(&data, 0, true).unwrap();
        assert_eq!(words(&ins), vec![Op::CallFunc.word(), 2, CallFunc::CheckActorClass.word()]);

        // unknown number: no-op triple
        let data = [240, 111, 3, 0xE7, 0x03];
        let ins = decode(&data, 0, true).unwrap();
        assert_eq!(words(&ins), vec![Op::CallFunc.word(), 3, CallFunc::Nop.word()]);

        // known number, wrong argc
        assert_eq!(ext_call(27, 5), None);
    }

    #[test]
    fn flow_of_branches() {
        let mut goto = 52u32.to_le_bytes().to_vec();
        goto.extend_from_slice(&100u32.to_le_bytes());
        assert_eq!(decode(&goto, 0, false).unwrap().flow(), Flow::Goto(100));

        let mut ifgoto = 53u32.to_le_bytes().to_vec();
        ifgoto.extend_from_slice(&100u32.to_le_bytes());
        let ins = decode(&ifgoto, 0, false).unwrap();
        assert_eq!(ins.flow(), Flow::Next);
        assert_eq!(counted(&ins), CountingSink { words: 2, jumps: 1 });

        assert_eq!(decode(&1u32.to_le_bytes(), 0, false).unwrap().flow(), Flow::Stop);
        assert_eq!(decode(&999u32.to_le_bytes(), 0, false).unwrap().flow(), Flow::Stop);
    }

    #[test]
    fn truncated_operands() {
        assert!(decode(&[3, 0, 0, 0, 1], 0, false).is_none());
        assert!(decode(&[], 0, true).is_none());
        assert!(decode(&[1, 2], 7, true).is_none());
    }
}
