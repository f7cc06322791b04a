use serde::{Deserialize, Serialize};

/// Icons the front-end can render. Stored by their component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Icon {
    FaUsers,
    FaSolarPanel,
    FaBolt,
    FaLeaf,
    FaSun,
    FaBatteryFull,
    FaChargingStation,
    FaIndustry,
    FaHome,
    FaTools,
    FaHandshake,
    FaAward,
    FaCertificate,
    FaClipboardCheck,
    FaProjectDiagram,
    FaRupeeSign,
    FaShieldAlt,
    FaHeadset,
    FaTruck,
    FaGlobe,
    FaCheckCircle,
    FaLightbulb,
    FaRecycle,
    FaChartLine,
}

static ICONS: [(&str, Icon); 24] = [
    ("FaUsers", Icon::FaUsers),
    ("FaSolarPanel", Icon::FaSolarPanel),
    ("FaBolt", Icon::FaBolt),
    ("FaLeaf", Icon::FaLeaf),
    ("FaSun", Icon::FaSun),
    ("FaBatteryFull", Icon::FaBatteryFull),
    ("FaChargingStation", Icon::FaChargingStation),
    ("FaIndustry", Icon::FaIndustry),
    ("FaHome", Icon::FaHome),
    ("FaTools", Icon::FaTools),
    ("FaHandshake", Icon::FaHandshake),
    ("FaAward", Icon::FaAward),
    ("FaCertificate", Icon::FaCertificate),
    ("FaClipboardCheck", Icon::FaClipboardCheck),
    ("FaProjectDiagram", Icon::FaProjectDiagram),
    ("FaRupeeSign", Icon::FaRupeeSign),
    ("FaShieldAlt", Icon::FaShieldAlt),
    ("FaHeadset", Icon::FaHeadset),
    ("FaTruck", Icon::FaTruck),
    ("FaGlobe", Icon::FaGlobe),
    ("FaCheckCircle", Icon::FaCheckCircle),
    ("FaLightbulb", Icon::FaLightbulb),
    ("FaRecycle", Icon::FaRecycle),
    ("FaChartLine", Icon::FaChartLine),
];

impl Icon {
    pub fn from_name(name: &str) -> Option<Self> {
        ICONS
            .iter()
            .find(|(icon_name, _)| *icon_name == name)
            .map(|(_, icon)| *icon)
    }

    pub fn name(self) -> &'static str {
        ICONS
            .iter()
            .find(|(_, icon)| *icon == self)
            .map(|(name, _)| *name)
            .unwrap_or("FaSolarPanel")
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        ICONS.iter().map(|(name, _)| *name)
    }
}
