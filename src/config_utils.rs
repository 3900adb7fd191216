use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use xml::reader::EventReader;
use xml::attribute::OwnedAttribute;
use yaml_rust::Yaml;

use super::AssignError;


pub fn xml_parser_from_path(path: &Path) -> Result<EventReader<BufReader<File>>, Box<dyn Error>> {
    let file = File::open(path)?;
    let file = BufReader::new(file);
    Ok(EventReader::new(file))
}

pub fn get_xml_attribute_value(attributes: &Vec<OwnedAttribute>, attr_name: &str)
                               -> Option<String> {
    match attributes.iter().find(|attr| attr.name.local_name == attr_name) {
        Some(attr) => Some(attr.value.clone()),
        None => None,
    }
}

/// Like `get_xml_attribute_value`, but a missing attribute is an error.
pub fn require_xml_attribute(attributes: &Vec<OwnedAttribute>, attr_name: &str, elem: &str)
                             -> Result<String, AssignError> {
    get_xml_attribute_value(attributes, attr_name).ok_or_else(
        || AssignError::Config(format!("<{}> is missing attribute '{}'", elem, attr_name)))
}

pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// Reads a float from a yaml mapping.  Integer values are accepted too, since yaml
/// writes `1` and `1.0` as different types.
pub fn yaml_f64(yaml: &Yaml, key: &str, default: f64) -> Result<f64, AssignError> {
    match &yaml[key] {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::Integer(val) => Ok(*val as f64),
        Yaml::Real(_) => yaml[key].as_f64().ok_or_else(
            || AssignError::Config(format!("'{}' is not a number", key))),
        _ => Err(AssignError::Config(format!("'{}' is not a number", key))),
    }
}

pub fn yaml_usize(yaml: &Yaml, key: &str, default: usize) -> Result<usize, AssignError> {
    match &yaml[key] {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::Integer(val) if *val >= 0 => Ok(*val as usize),
        _ => Err(AssignError::Config(format!("'{}' must be a non-negative integer", key))),
    }
}

pub fn yaml_bool(yaml: &Yaml, key: &str, default: bool) -> Result<bool, AssignError> {
    match &yaml[key] {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::Boolean(val) => Ok(*val),
        _ => Err(AssignError::Config(format!("'{}' must be true or false", key))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    #[test]
    fn test_str_to_absolute_path() {
        let base = Path::new("/data/run");
        assert_eq!(str_to_absolute_path("net.xml", base), PathBuf::from("/data/run/net.xml"));
        assert_eq!(str_to_absolute_path("/tmp/net.xml", base), PathBuf::from("/tmp/net.xml"));
    }

    #[test]
    fn test_yaml_numbers() {
        let docs = YamlLoader::load_from_str("alpha: -1\ngamma: 0.5\nflag: yes_please").unwrap();
        let yaml = &docs[0];
        assert_eq!(yaml_f64(yaml, "alpha", 0.).unwrap(), -1.);
        assert_eq!(yaml_f64(yaml, "gamma", 0.).unwrap(), 0.5);
        assert_eq!(yaml_f64(yaml, "missing", 3.).unwrap(), 3.);
        assert!(yaml_bool(yaml, "flag", false).is_err());
        assert!(yaml_usize(yaml, "alpha", 1).is_err());
    }
}
