use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dog::DogId;
use crate::map::MapId;

/// Length of an auth token in hex characters.
pub const TOKEN_LEN: usize = 32;

/// Opaque bearer credential bound to one dog.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept a string of exactly 32 hex digits.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == TOKEN_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines without leaking the credential.
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "Token({prefix}..)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub token: Token,
    pub dog_id: DogId,
    pub map_id: MapId,
    /// Idle time after which the dog is retired.
    pub retire_after: Duration,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("token is already bound")]
    DuplicateToken,
    #[error("dog {dog} on map {map} already has a player")]
    DuplicateDog { dog: DogId, map: MapId },
    #[error("dog id space exhausted")]
    IdsExhausted,
}

/// Owns every player binding and hands out dog ids.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    by_token: HashMap<Token, Player>,
    by_dog: HashMap<(DogId, MapId), Token>,
    next_dog_id: DogId,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_dog_id(&mut self) -> Result<DogId, RegistryError> {
        let id = self.next_dog_id;
        self.next_dog_id = id.checked_add(1).ok_or(RegistryError::IdsExhausted)?;
        Ok(id)
    }

    /// Make sure future dog ids are greater than `id`.
    pub fn reserve_dog_id(&mut self, id: DogId) -> Result<(), RegistryError> {
        let next = id.checked_add(1).ok_or(RegistryError::IdsExhausted)?;
        self.next_dog_id = self.next_dog_id.max(next);
        Ok(())
    }

    pub fn next_dog_id(&self) -> DogId {
        self.next_dog_id
    }

    /// Generate a token not bound to any player, retrying on collision.
    pub fn issue_token(&self) -> Token {
        loop {
            let token = Token::generate();
            if !self.by_token.contains_key(&token) {
                return token;
            }
        }
    }

    pub fn bind(&mut self, player: Player) -> Result<(), RegistryError> {
        if self.by_token.contains_key(&player.token) {
            return Err(RegistryError::DuplicateToken);
        }
        let key = (player.dog_id, player.map_id.clone());
        if self.by_dog.contains_key(&key) {
            return Err(RegistryError::DuplicateDog {
                dog: player.dog_id,
                map: player.map_id,
            });
        }
        self.by_dog.insert(key, player.token.clone());
        self.by_token.insert(player.token.clone(), player);
        Ok(())
    }

    pub fn find_by_token(&self, token: &Token) -> Option<&Player> {
        self.by_token.get(token)
    }

    pub fn find_by_dog(&self, dog_id: DogId, map_id: &MapId) -> Option<&Player> {
        self.by_dog
            .get(&(dog_id, map_id.clone()))
            .and_then(|token| self.by_token.get(token))
    }

    /// Drop the player bound to a dog, returning the binding.
    pub fn unbind_dog(&mut self, dog_id: DogId, map_id: &MapId) -> Option<Player> {
        let token = self.by_dog.remove(&(dog_id, map_id.clone()))?;
        self.by_token.remove(&token)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.by_token.values()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
