macro_rules! resource {
    ($file: expr) => {
        include_str!($file)
    };
}

pub static BRIDGE_CONFIG: &str = resource!("../../../resources/bridge.json");
