//! Cliente HTTP de datos de referencia
//!
//! Vehículos (`/vehiculos/`), personal (`/usuarios/`), puntos de origen
//! (`/puntos-siembra/`) y departamentos (`/departamentos/`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::clients::ReferenceData;
use crate::models::{OriginPoint, Person, Region, Vehicle, VehicleCategory};
use crate::utils::errors::{AppError, AppResult};

/// Vehículo tal como lo expone el servicio de flota
#[derive(Debug, Clone, Deserialize)]
pub struct VehiculoWire {
    pub id: i64,
    pub placa: String,
    pub tipo: String,
    #[serde(default)]
    pub marca: Option<String>,
    #[serde(default)]
    pub modelo: Option<String>,
    pub capacidad_carga_kg: Decimal,
    #[serde(default)]
    pub capacidad_volumen_m3: Option<Decimal>,
    #[serde(default)]
    pub largo_m: Option<Decimal>,
    #[serde(default)]
    pub ancho_m: Option<Decimal>,
    #[serde(default)]
    pub alto_m: Option<Decimal>,
    pub activo: bool,
}

impl From<VehiculoWire> for Vehicle {
    fn from(wire: VehiculoWire) -> Self {
        let category = match wire.tipo.as_str() {
            "camion" => VehicleCategory::Truck,
            "pickup" => VehicleCategory::Pickup,
            _ => VehicleCategory::Van,
        };

        Vehicle {
            id: wire.id,
            license_plate: wire.placa,
            category,
            brand: wire.marca,
            model: wire.modelo,
            weight_capacity_kg: wire.capacidad_carga_kg,
            volume_capacity_m3: wire.capacidad_volumen_m3,
            length_m: wire.largo_m,
            width_m: wire.ancho_m,
            height_m: wire.alto_m,
            active: wire.activo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsuarioWire {
    pub id: i64,
    pub nombre_completo: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_true")]
    pub activo: bool,
}

impl From<UsuarioWire> for Person {
    fn from(wire: UsuarioWire) -> Self {
        Person {
            id: wire.id,
            full_name: wire.nombre_completo,
            email: wire.email,
            roles: wire.roles,
            active: wire.activo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PuntoOrigenWire {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub departamento: Option<i64>,
    #[serde(default)]
    pub municipio_nombre: Option<String>,
    #[serde(default = "default_true")]
    pub activo: bool,
}

impl From<PuntoOrigenWire> for OriginPoint {
    fn from(wire: PuntoOrigenWire) -> Self {
        OriginPoint {
            id: wire.id,
            name: wire.nombre,
            region_id: wire.departamento,
            municipality: wire.municipio_nombre,
            active: wire.activo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartamentoWire {
    pub id: i64,
    pub nombre: String,
}

impl From<DepartamentoWire> for Region {
    fn from(wire: DepartamentoWire) -> Self {
        Region {
            id: wire.id,
            name: wire.nombre,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Cliente HTTP para flota, personal y ubicaciones
pub struct HttpReferenceClient {
    client: Client,
    base_url: String,
}

impl HttpReferenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Error creando cliente de referencia: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("📡 GET {}", url);

        let response = self.client.get(&url).send().await.map_err(external)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .map_err(external)?
            .json()
            .await
            .map_err(external)?;
        Ok(Some(body))
    }

    async fn get_list<W: DeserializeOwned, T: From<W>>(&self, path: &str) -> AppResult<Vec<T>> {
        let items: Vec<W> = self.get_json(path).await?.unwrap_or_default();
        Ok(items.into_iter().map(T::from).collect())
    }
}

fn external(e: reqwest::Error) -> AppError {
    AppError::ExternalApi(format!("Servicio de referencia: {}", e))
}

#[async_trait]
impl ReferenceData for HttpReferenceClient {
    async fn get_vehicle(&self, vehicle_id: i64) -> AppResult<Option<Vehicle>> {
        let wire: Option<VehiculoWire> = self.get_json(&format!("/vehiculos/{}/", vehicle_id)).await?;
        Ok(wire.map(Vehicle::from))
    }

    async fn list_vehicles(&self, active_only: bool) -> AppResult<Vec<Vehicle>> {
        let path = if active_only {
            "/vehiculos/?activo=true"
        } else {
            "/vehiculos/"
        };
        self.get_list::<VehiculoWire, Vehicle>(path).await
    }

    async fn get_person(&self, person_id: i64) -> AppResult<Option<Person>> {
        let wire: Option<UsuarioWire> = self.get_json(&format!("/usuarios/{}/", person_id)).await?;
        Ok(wire.map(Person::from))
    }

    async fn list_origin_points(&self) -> AppResult<Vec<OriginPoint>> {
        self.get_list::<PuntoOrigenWire, OriginPoint>("/puntos-siembra/").await
    }

    async fn list_regions(&self) -> AppResult<Vec<Region>> {
        self.get_list::<DepartamentoWire, Region>("/departamentos/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vehiculo_wire_to_vehicle() {
        let wire: VehiculoWire = serde_json::from_value(json!({
            "id": 3,
            "placa": "C-456DEF",
            "tipo": "camion",
            "marca": "Isuzu",
            "modelo": "NPR",
            "capacidad_carga_kg": "3500.00",
            "capacidad_volumen_m3": null,
            "largo_m": "4.20",
            "ancho_m": "2.00",
            "alto_m": "2.10",
            "activo": true
        }))
        .unwrap();

        let vehicle = Vehicle::from(wire);
        assert_eq!(vehicle.category, VehicleCategory::Truck);
        assert_eq!(vehicle.weight_capacity_kg, Decimal::from(3500));
        assert!(vehicle.volume_capacity_m3.is_none());
        assert_eq!(vehicle.dimensions_label().as_deref(), Some("4.20 x 2.00 x 2.10 m"));
    }

    #[test]
    fn test_panel_maps_to_van() {
        let wire: VehiculoWire = serde_json::from_value(json!({
            "id": 4,
            "placa": "P-1",
            "tipo": "panel",
            "capacidad_carga_kg": 800,
            "activo": false
        }))
        .unwrap();
        let vehicle = Vehicle::from(wire);
        assert_eq!(vehicle.category, VehicleCategory::Van);
        assert!(!vehicle.active);
    }

    #[test]
    fn test_usuario_defaults_to_active() {
        let wire: UsuarioWire = serde_json::from_value(json!({
            "id": 9,
            "nombre_completo": "Luis Caal"
        }))
        .unwrap();
        let person = Person::from(wire);
        assert!(person.active);
        assert!(person.roles.is_empty());
    }
}
