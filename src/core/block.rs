use serde::{Deserialize, Serialize};

/// Every block the generator can emit. The discriminant doubles as the
/// integer stored in the collision grid, so `Air` must stay at zero.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    Air = 0,
    Grass,
    Dirt,
    Clay,
    Sand,
    Sandstone,
    Snow,
    Ice,
    Mud,
    Gravel,
    Stone,
    Granite,
    Andesite,
    CoalOre,
    IronOre,
    GoldOre,
    DiamondOre,
    Crystal,
    Water,
    Lava,
    Wood,
    Leaves,
    Ashstone,
    Basalt,
    Magma,
    Obsidian,
}

impl BlockType {
    pub const ALL: [BlockType; 26] = [
        BlockType::Air,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Clay,
        BlockType::Sand,
        BlockType::Sandstone,
        BlockType::Snow,
        BlockType::Ice,
        BlockType::Mud,
        BlockType::Gravel,
        BlockType::Stone,
        BlockType::Granite,
        BlockType::Andesite,
        BlockType::CoalOre,
        BlockType::IronOre,
        BlockType::GoldOre,
        BlockType::DiamondOre,
        BlockType::Crystal,
        BlockType::Water,
        BlockType::Lava,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::Ashstone,
        BlockType::Basalt,
        BlockType::Magma,
        BlockType::Obsidian,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Unknown ids map to Air, matching how the rest of the world treats
    /// anything it cannot account for.
    #[inline]
    pub fn from_id(id: u8) -> BlockType {
        Self::ALL.get(id as usize).copied().unwrap_or(BlockType::Air)
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self == BlockType::Air
    }

    pub fn is_liquid(self) -> bool {
        matches!(self, BlockType::Water | BlockType::Lava)
    }

    pub fn is_solid(self) -> bool {
        !self.is_air() && !self.is_liquid()
    }

    /// Cells vegetation is allowed to grow into.
    pub fn is_replaceable(self) -> bool {
        matches!(self, BlockType::Air | BlockType::Water)
    }

    pub fn glyph(self) -> char {
        match self {
            BlockType::Air => ' ',
            BlockType::Grass => '"',
            BlockType::Dirt => '%',
            BlockType::Clay => 'c',
            BlockType::Sand | BlockType::Sandstone => ':',
            BlockType::Snow => '*',
            BlockType::Ice => '=',
            BlockType::Mud => 'm',
            BlockType::Gravel => ',',
            BlockType::Stone => '#',
            BlockType::Granite => 'g',
            BlockType::Andesite => 'a',
            BlockType::CoalOre => 'C',
            BlockType::IronOre => 'I',
            BlockType::GoldOre => 'G',
            BlockType::DiamondOre => 'D',
            BlockType::Crystal => '+',
            BlockType::Water => '~',
            BlockType::Lava => '!',
            BlockType::Wood => '|',
            BlockType::Leaves => '&',
            BlockType::Ashstone => 'x',
            BlockType::Basalt => 'b',
            BlockType::Magma => 'M',
            BlockType::Obsidian => 'O',
        }
    }
}
