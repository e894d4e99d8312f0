use serde::{Deserialize, Serialize};

use crate::core::block::BlockType;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Biome {
    #[default]
    Plains,
    Forest,
    Desert,
    Mountain,
    Swamp,
    Tundra,
    Jungle,
    Ocean,
}

impl Biome {
    pub fn surface_block(&self) -> BlockType {
        match self {
            Biome::Plains | Biome::Forest | Biome::Jungle => BlockType::Grass,
            Biome::Desert | Biome::Ocean => BlockType::Sand,
            Biome::Mountain => BlockType::Stone,
            Biome::Swamp => BlockType::Mud,
            Biome::Tundra => BlockType::Snow,
        }
    }

    pub fn soil_block(&self) -> BlockType {
        match self {
            Biome::Plains | Biome::Forest | Biome::Jungle | Biome::Tundra => BlockType::Dirt,
            Biome::Desert => BlockType::Sandstone,
            Biome::Ocean => BlockType::Sand,
            Biome::Mountain => BlockType::Gravel,
            Biome::Swamp => BlockType::Mud,
        }
    }

    /// Material substituted into the soil band by the pocket noise.
    pub fn pocket_block(&self) -> BlockType {
        match self {
            Biome::Desert | Biome::Ocean => BlockType::Gravel,
            Biome::Mountain => BlockType::Stone,
            _ => BlockType::Clay,
        }
    }

    /// Surface block trees may root in, if the biome grows any.
    pub fn vegetation_host(&self) -> Option<BlockType> {
        match self {
            Biome::Plains | Biome::Forest | Biome::Jungle => Some(BlockType::Grass),
            Biome::Swamp => Some(BlockType::Mud),
            Biome::Tundra => Some(BlockType::Snow),
            Biome::Desert | Biome::Mountain | Biome::Ocean => None,
        }
    }

    /// Per-column probability of a tree on a valid host block.
    pub fn tree_chance(&self) -> f64 {
        match self {
            Biome::Plains => 0.05,
            Biome::Forest => 0.22,
            Biome::Jungle => 0.35,
            Biome::Swamp => 0.10,
            Biome::Tundra => 0.04,
            Biome::Desert | Biome::Mountain | Biome::Ocean => 0.0,
        }
    }

    pub fn has_trees(&self) -> bool {
        self.vegetation_host().is_some() && self.tree_chance() > 0.0
    }
}
