//! Native functions reached through `CallFunc`, and actor property numbers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! define_callfuncs {
    ($($name:ident),* $(,)?) => {
        /// Native function index used by `CallFunc` / `CallFuncImm`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[repr(u32)]
        pub enum CallFunc {
            /// Discards its arguments and pushes nothing.
            Nop,
            $(#[allow(missing_docs)] $name,)*
        }

        impl CallFunc {
            /// Every function, indexed by its numeric value.
            pub const ALL: &'static [Self] = &[Self::Nop, $(Self::$name),*];

            /// Function name.
            pub const fn name(self) -> &'static str {
                match self {
                    Self::Nop => "Nop",
                    $(Self::$name => stringify!($name),)*
                }
            }
        }
    };
}

define_callfuncs! {
    PlayerArmorPoints,
    PlayerFrags,
    PlayerHealth,
    GetSigilPieces,
    ActivatorSound,
    ActivatorTID,
    AmbientSound,
    LocalAmbientSound,
    VectorAngle,
    ChangeCeiling,
    ChangeFloor,
    CheckProximity,
    CheckSight,
    CheckWeapon,
    CheckActorCeilingTexture,
    CheckFlag,
    SetLineActivation,
    CheckActorFloorTexture,
    CheckActorProperty,
    CheckActorClass,
    ClassifyActor,
    ClearLineSpecial,
    Cos,
    EndLog,
    EndPrint,
    EndPrintBold,
    GameSkill,
    GameType,
    GetCVar,
    GetCVarString,
    CheckInventory,
    GetLevelInfo,
    GetLineX,
    GetLineY,
    GetPlayerInput,
    GetPolyobjX,
    GetPolyobjY,
    SetPolyobjXY,
    GetScreenH,
    GetScreenW,
    GetSectorCeilingZ,
    GetSectorFloorZ,
    GetSectorLightLevel,
    GetActorAngle,
    GetActorCeilingZ,
    GetActorFloorZ,
    GetActorLightLevel,
    GetActorVelX,
    GetActorVelY,
    GetActorVelZ,
    GetActorPitch,
    GetActorProperty,
    GetActorX,
    GetActorY,
    GetActorZ,
    GetWeapon,
    VectorLength,
    IsTIDUsed,
    GetLineRowOffset,
    LineSide,
    PlaySound,
    PlayActorSound,
    PlayerCount,
    PlayerNumber,
    PrintName,
    RadiusQuake2,
    Random,
    ReplaceTextures,
    SectorDamage,
    SectorSound,
    SetActivator,
    SetActivatorToTarget,
    SetAirControl,
    SetAirFriction,
    SetGravity,
    SetLineBlocking,
    SetLineMonsterBlocking,
    SetLineSpecial,
    SetLineTexture,
    SetMusic,
    LocalSetMusic,
    SetSectorDamage,
    SetSkyScrollSpeed,
    SetActorAngle,
    ChangeActorAngle,
    SetActorVelocity,
    SetActorPitch,
    ChangeActorPitch,
    SetActorPosition,
    SetActorProperty,
    SetThingSpecial,
    SetActorState,
    SetWeapon,
    Sin,
    SinglePlayer,
    SoundSequence,
    SpawnProjectile,
    Spawn,
    SpawnForced,
    SpawnSpot,
    SpawnSpotForced,
    SpawnSpotFacing,
    SpawnSpotFacingForced,
    Sqrt,
    FixedSqrt,
    StopSound,
    GiveInventory,
    TakeInventory,
    ThingCount,
    ThingCountName,
    ThingCountSector,
    ThingCountNameSector,
    ThingDamage2,
    ThingProjectile2,
    ThingSound,
    SoundSequenceOnActor,
    Timer,
    UniqueTID,
    PolyWait,
    TagWait,
}

impl CallFunc {
    /// Decodes a function word.
    pub fn from_u32(v: u32) -> Option<Self> { Self::ALL.get(v as usize).copied() }

    /// Function word.
    pub const fn word(self) -> u32 { self as u32 }
}

/// Actor property numbers read by `GetThingVar`.
///
/// The numbers below 108 are the public ones scripts may pass to
/// `GetActorProperty`; the rest are reserved for translated opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
#[allow(missing_docs)]
pub enum ThingProp {
    Health = 0,
    Angle = 108,
    Armor,
    CeilTex,
    CeilZ,
    FloorTex,
    FloorZ,
    Frags,
    LightLevel,
    MomX,
    MomY,
    MomZ,
    Pitch,
    PlayerNumber,
    SigilPieces,
    Tid,
    Type,
    X,
    Y,
    Z,
}

impl ThingProp {
    const INTERNAL: [Self; 19] = [
        Self::Angle, Self::Armor, Self::CeilTex, Self::CeilZ, Self::FloorTex, Self::FloorZ,
        Self::Frags, Self::LightLevel, Self::MomX, Self::MomY, Self::MomZ, Self::Pitch,
        Self::PlayerNumber, Self::SigilPieces, Self::Tid, Self::Type, Self::X, Self::Y, Self::Z,
    ];

    /// Decodes a property word; only the values this crate emits are known.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Health),
            108..=126 => Some(Self::INTERNAL[(v - 108) as usize]),
            _ => None,
        }
    }

    /// Property word.
    pub const fn word(self) -> u32 { self as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_is_first() {
        assert_eq!(CallFunc::Nop.word(), 0);
        for (i, f) in CallFunc::ALL.iter().enumerate() {
            assert_eq!(f.word() as usize, i, "{}", f.name());
        }
    }

    #[test]
    fn internal_props_follow_counters() {
        assert_eq!(ThingProp::Angle.word(), 108);
        assert_eq!(ThingProp::MomX.word(), 116);
        assert_eq!(ThingProp::Z.word(), 126);
        for p in ThingProp::INTERNAL {
            assert_eq!(ThingProp::from_u32(p.word()), Some(p));
        }
        assert_eq!(ThingProp::from_u32(127), None);
    }
}
