//! Static table of known municipalities and coordinate classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::coord::{CoordKey, Coordinate};

/// A known municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub country: String,
    pub coordinate: Coordinate,
}

/// (id, name, state, longitude, latitude)
type CityRow = (u64, &'static str, &'static str, f64, f64);

/// Guanajuato-region municipalities. Abasolo appears twice in the source
/// listing; [`CityCatalog::new`] keeps the first occurrence of each id.
const KNOWN_CITIES: &[CityRow] = &[
    (4019867, "Abasolo", "Guanajuato", -100.400002, 25.950001),
    (4019827, "Acámbaro", "", -100.73333, 20.033331),
    (4018761, "Allende", "", -100.849998, 28.33333),
    (4018403, "Apaseo el Grande", "", -100.699997, 20.566669),
    (4018404, "Apaseo el Alto", "", -100.616669, 20.450001),
    (3797740, "Atarjea", "", -99.718613, 21.26944),
    (4014875, "Celaya", "", -100.816673, 20.51667),
    (4013705, "Ciudad Manuel Doblado", "", -101.933327, 20.73333),
    (4013094, "Comonfort", "", -100.76667, 20.716669),
    (4012842, "Coroneo", "", -100.333328, 20.133329),
    (4012721, "Cortazar", "", -100.933327, 20.48333),
    (4012341, "Cuerámaro", "", -101.716667, 20.616671),
    (4022983, "Doctor Mora", "", -100.3125, 21.14167),
    (
        4023117,
        "Dolores Hidalgo Cuna de la Independencia Nacional",
        "",
        -100.930832,
        21.156111,
    ),
    (4005267, "Estado de Guanajuato", "", -101.0, 21.0),
    (4005270, "Guanajuato", "", -101.259102, 21.018579),
    (4004688, "Huanímaro", "", -101.5, 20.366671),
    (4004330, "Irapuato", "", -101.349998, 20.683331),
    (4004092, "Jaral del Progreso", "", -101.066673, 20.366671),
    (4004026, "Jerécuaro", "", -100.51667, 20.15),
    (3998655, "León de los Aldama", "", -101.666672, 21.116671),
    (3995343, "Moroleón", "", -101.199997, 20.133329),
    (3522493, "Ocampo", "", -99.333328, 22.83333),
    (3992986, "Pénjamo", "", -101.73333, 20.433331),
    (4007676, "Pueblo Nuevo", "", -105.383331, 23.383329),
    (3988462, "Romita", "", -101.51667, 20.866671),
    (3988214, "Salamanca", "", -101.199997, 20.566669),
    (3988050, "Salvatierra", "", -100.883331, 20.216669),
    (3987309, "San Diego de la Unión", "", -100.866669, 21.466669),
    (3987246, "San Felipe", "", -101.216667, 21.48333),
    (3986984, "San Francisco del Rincón", "", -101.849998, 21.01667),
    (3986088, "San José Iturbide", "", -100.383331, 21.0),
    (3985620, "San Luis de la Paz", "", -100.51667, 21.299999),
    (3517687, "Santa Catarina", "", -99.133331, 18.966669),
    (4003662, "Juventino Rosas", "", -101.0, 20.65),
    (3983635, "Santiago Maravatío", "", -101.0, 20.16667),
    (3983058, "Silao", "", -101.433327, 20.933331),
    (3982401, "Tarandacuao", "", -100.533333, 20.0),
    (3982364, "Tarimoro", "", -100.75, 20.283331),
    (3801276, "Tierra Blanca", "", -96.347778, 18.45722),
    (3980777, "Uriangato", "", -101.183327, 20.15),
    (3980605, "Valle de Santiago", "", -101.199997, 20.383329),
    (4022970, "Victoria", "", -100.211937, 21.210831),
    (3980174, "Villagrán", "", -100.98333, 20.51667),
    (3979855, "Yuriria", "", -101.150002, 20.200001),
    (4019867, "Abasolo", "", -100.400002, 25.950001),
];

/// Immutable lookup table built once at startup.
#[derive(Debug, Clone)]
pub struct CityCatalog {
    cities: Vec<City>,
    by_key: HashMap<CoordKey, usize>,
    by_name: HashMap<String, usize>,
}

impl CityCatalog {
    /// Build a catalog from an iterator of cities, deduplicating by id.
    pub fn new(cities: impl IntoIterator<Item = City>) -> Self {
        let mut catalog = Self {
            cities: Vec::new(),
            by_key: HashMap::new(),
            by_name: HashMap::new(),
        };

        for city in cities {
            if catalog.cities.iter().any(|c| c.id == city.id) {
                continue;
            }
            let idx = catalog.cities.len();
            catalog.by_key.entry(city.coordinate.key()).or_insert(idx);
            catalog.by_name.entry(city.name.clone()).or_insert(idx);
            catalog.cities.push(city);
        }

        catalog
    }

    /// The built-in municipality table.
    pub fn builtin() -> Self {
        Self::new(KNOWN_CITIES.iter().map(|&(id, name, state, lon, lat)| City {
            id,
            name: name.to_string(),
            state: state.to_string(),
            country: "MX".to_string(),
            coordinate: Coordinate {
                latitude: lat,
                longitude: lon,
            },
        }))
    }

    /// Find the city whose normalized coordinate matches, if any.
    pub fn classify(&self, coordinate: &Coordinate) -> Option<&City> {
        self.by_key
            .get(&coordinate.key())
            .map(|&idx| &self.cities[idx])
    }

    /// Exact, case-sensitive name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&City> {
        self.by_name.get(name).map(|&idx| &self.cities[idx])
    }

    /// Cities in table order.
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Default for CityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_deduplicates() {
        let catalog = CityCatalog::builtin();
        assert_eq!(catalog.len(), 45);
        assert_eq!(catalog.cities()[0].name, "Abasolo");
        assert_eq!(catalog.cities()[0].state, "Guanajuato");
        assert_eq!(catalog.cities()[44].name, "Yuriria");
    }

    #[test]
    fn test_classify_known_city() {
        let catalog = CityCatalog::builtin();
        let point = Coordinate::new(21.018579, -101.259102).unwrap();
        let city = catalog.classify(&point).unwrap();
        assert_eq!(city.id, 4005270);
        assert_eq!(city.name, "Guanajuato");
        assert_eq!(city.country, "MX");
    }

    #[test]
    fn test_classify_is_idempotent_under_noise() {
        let catalog = CityCatalog::builtin();
        let exact = Coordinate::new(20.51667, -100.816673).unwrap();
        let noisy = Coordinate::new(20.5166700004, -100.8166729996).unwrap();

        let a = catalog.classify(&exact).map(|c| c.id);
        let b = catalog.classify(&noisy).map(|c| c.id);
        assert_eq!(a, Some(4014875));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unaffiliated_point() {
        let catalog = CityCatalog::builtin();
        let point = Coordinate::new(20.5058, -101.53802).unwrap();
        assert!(catalog.classify(&point).is_none());
    }

    #[test]
    fn test_find_by_name_is_exact() {
        let catalog = CityCatalog::builtin();
        assert_eq!(catalog.find_by_name("León de los Aldama").map(|c| c.id), Some(3998655));
        assert!(catalog.find_by_name("leon de los aldama").is_none());
        assert!(catalog.find_by_name("Springfield").is_none());
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = CityCatalog::new(vec![
            City {
                id: 1,
                name: "Alpha".into(),
                state: String::new(),
                country: "MX".into(),
                coordinate: Coordinate::new(1.0, 2.0).unwrap(),
            },
            City {
                id: 1,
                name: "Alpha again".into(),
                state: String::new(),
                country: "MX".into(),
                coordinate: Coordinate::new(3.0, 4.0).unwrap(),
            },
        ]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.find_by_name("Alpha again").is_none());
    }
}
