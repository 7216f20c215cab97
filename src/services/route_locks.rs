//! Bloqueos por ruta
//!
//! Serializa las mutaciones sobre una misma ruta. Las lecturas no pasan por
//! aquí. Las llamadas a servicios externos se hacen antes de tomar el bloqueo.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct RouteLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl RouteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tomar el bloqueo exclusivo de una ruta
    pub async fn acquire(&self, route_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(route_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Olvidar el bloqueo de una ruta eliminada o cerrada
    pub async fn forget(&self, route_id: Uuid) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(&route_id) {
            // Solo si nadie más lo está usando
            if Arc::strong_count(lock) == 1 {
                locks.remove(&route_id);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
