//! CFOP (fiscal operation code) parsing and the normative incentive tables.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of an operation, from the first digit of its CFOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Direction {
    /// Inbound (1xxx state, 2xxx interstate, 3xxx import)
    Entrada,
    /// Outbound (5xxx state, 6xxx interstate, 7xxx export)
    Saida,
}

/// A four digit CFOP whose first digit is 1-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cfop(u16);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid CFOP '{0}': expected four digits starting with 1-7")]
pub struct InvalidCfop(pub String);

impl FromStr for Cfop {
    type Err = InvalidCfop;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = s.len() == 4
            && s.bytes().all(|b| b.is_ascii_digit())
            && matches!(s.as_bytes()[0], b'1'..=b'7');
        if !valid {
            return Err(InvalidCfop(s.to_string()));
        }
        s.parse::<u16>()
            .map(Cfop)
            .map_err(|_| InvalidCfop(s.to_string()))
    }
}

impl fmt::Display for Cfop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl Serialize for Cfop {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cfop {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Cfop {
    fn schema_name() -> String {
        "Cfop".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl Cfop {
    pub fn code(&self) -> u16 {
        self.0
    }

    fn leading_digit(&self) -> u16 {
        self.0 / 1000
    }

    /// `None` for the 4xxx range, which has no direction in this model.
    pub fn direction(&self) -> Option<Direction> {
        match self.leading_digit() {
            1..=3 => Some(Direction::Entrada),
            5..=7 => Some(Direction::Saida),
            _ => None,
        }
    }

    /// Generic CFOPs need a per-taxpayer decision on whether they are incentivized.
    pub fn is_generic(&self) -> bool {
        GENERIC.contains(&self.0)
    }

    /// Normative incentive status for the given direction.
    pub fn is_normatively_incentivized(&self, direction: Direction) -> bool {
        match direction {
            Direction::Entrada => INCENTIVIZED_ENTRADAS.contains(&self.0),
            Direction::Saida => INCENTIVIZED_SAIDAS.contains(&self.0),
        }
    }

    /// Freight service provision, in state or interstate.
    pub fn is_freight(&self) -> bool {
        FREIGHT.contains(&self.0)
    }

    pub fn is_interstate_freight(&self) -> bool {
        self.is_freight() && self.leading_digit() == 6
    }

    /// Description shown when asking for a generic CFOP decision.
    pub fn description(&self) -> &'static str {
        match self.0 {
            1905 | 1906 | 2905 => "Entrada - Recebimento via armazém geral (genérico)",
            1910 => "Entrada - Bonificação, doação ou brinde (genérico)",
            1911 => "Entrada - Amostra grátis (genérico)",
            1917 => "Entrada - Consignação mercantil (genérico)",
            1918 => "Entrada - Devolução de consignação (genérico)",
            1949 | 3949 => "Entrada - Outra operação (genérico)",
            2910 => "Entrada Interestadual - Bonificação, doação ou brinde (genérico)",
            2911 => "Entrada Interestadual - Amostra grátis (genérico)",
            2917 => "Entrada Interestadual - Consignação mercantil (genérico)",
            2918 => "Entrada Interestadual - Devolução de consignação (genérico)",
            2934 => "Entrada Interestadual - Complementar de ICMS (genérico)",
            2949 => "Entrada Interestadual - Outra operação (genérico)",
            5905 | 5906 => "Saída - Remessa via armazém geral (genérico)",
            5910 => "Saída - Bonificação, doação ou brinde (genérico)",
            5917 => "Saída - Consignação mercantil (genérico)",
            5918 => "Saída - Devolução de consignação (genérico)",
            5927 => "Saída - Baixa de estoque (genérico)",
            5928 => "Saída - Encerramento de atividade (genérico)",
            5949 => "Saída - Outra operação (genérico)",
            6905 | 6906 => "Saída Interestadual - Remessa via armazém geral (genérico)",
            6910 => "Saída Interestadual - Bonificação, doação ou brinde (genérico)",
            6917 => "Saída Interestadual - Consignação mercantil (genérico)",
            6918 => "Saída Interestadual - Devolução de consignação (genérico)",
            6934 => "Saída Interestadual - Complementar de ICMS (genérico)",
            6949 => "Saída Interestadual - Outra operação (genérico)",
            7949 => "Saída Exterior - Outra operação (genérico)",
            _ => "",
        }
    }
}

/// CFOPs that need a per-taxpayer decision.
pub const GENERIC: &[u16] = &[
    1905, 1906, 1910, 1911, 1917, 1918, 1949, //
    2905, 2910, 2911, 2917, 2918, 2934, 2949, //
    3949, //
    5905, 5906, 5910, 5917, 5918, 5927, 5928, 5949, //
    6905, 6906, 6910, 6917, 6918, 6934, 6949, //
    7949,
];

/// Inbound CFOPs whose ICMS counts as incentivized.
pub const INCENTIVIZED_ENTRADAS: &[u16] = &[
    1101, 1116, 1120, 1122, 1124, 1125, 1131, 1135, 1151, 1159, 1201, 1203, 1206, 1208, 1212,
    1213, 1214, 1215, 1252, 1257, 1352, 1360, 1401, 1406, 1408, 1410, 1414, 1453, 1454, 1455,
    1503, 1505, 1551, 1552, 1651, 1653, 1658, 1660, 1661, 1662, 1910, 1911, 1917, 1918, 1932,
    1949, //
    2101, 2116, 2120, 2122, 2124, 2125, 2131, 2135, 2151, 2159, 2201, 2203, 2206, 2208, 2212,
    2213, 2214, 2215, 2252, 2257, 2352, 2401, 2406, 2408, 2410, 2414, 2453, 2454, 2455, 2503,
    2505, 2551, 2552, 2651, 2653, 2658, 2660, 2661, 2662, 2664, 2910, 2911, 2917, 2918, 2932,
    2949, //
    3101, 3127, 3129, 3201, 3206, 3211, 3212, 3352, 3551, 3651, 3653, 3949,
];

/// Outbound CFOPs whose ICMS counts as incentivized.
pub const INCENTIVIZED_SAIDAS: &[u16] = &[
    5101, 5103, 5105, 5109, 5116, 5118, 5122, 5124, 5125, 5129, 5131, 5132, 5151, 5155, 5159,
    5201, 5206, 5207, 5208, 5213, 5214, 5215, 5216, 5401, 5402, 5408, 5410, 5451, 5452, 5456,
    5501, 5651, 5652, 5653, 5658, 5660, 5910, 5911, 5917, 5918, 5927, 5928, //
    6101, 6103, 6105, 6107, 6109, 6116, 6118, 6122, 6124, 6125, 6129, 6131, 6132, 6151, 6155,
    6159, 6201, 6206, 6207, 6208, 6213, 6214, 6215, 6216, 6401, 6402, 6408, 6410, 6451, 6452,
    6456, 6501, 6651, 6652, 6653, 6658, 6660, 6663, 6905, 6910, 6911, 6917, 6918, 6934, //
    7101, 7105, 7127, 7129, 7201, 7206, 7207, 7211, 7212, 7251, 7504, 7651, 7667,
];

/// Transport service provisions (53xx state, 63xx interstate).
pub const FREIGHT: &[u16] = &[
    5351, 5352, 5353, 5354, 5355, 5356, 5357, 5359, 5360, 5932, //
    6351, 6352, 6353, 6354, 6355, 6356, 6357, 6359, 6360, 6932,
];
