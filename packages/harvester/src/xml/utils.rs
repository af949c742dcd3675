//! XML utility functions for navigating namespaced DOM trees.
//!
//! Geocoder responses mix several namespaces; every lookup here compares
//! local names only.

use roxmltree::Node;

/// Get the tag name without namespace.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use cashpoints_harvester::xml::get_tag_name;
///
/// let xml = r#"<ymaps xmlns="http://maps.yandex.ru/ymaps/1.x"><GeoObjectCollection/></ymaps>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert_eq!(get_tag_name(doc.root_element()), "ymaps");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Check if a node is an element with the given local name.
pub fn has_tag(node: Node<'_, '_>, tag: &str) -> bool {
    node.is_element() && get_tag_name(node) == tag
}

/// Find the first child element with the given local name.
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| has_tag(*child, tag))
}

/// Follow a slash-separated path of child tag names.
///
/// # Arguments
/// * `node` - Starting node
/// * `path` - Path such as `"GeoObject/metaDataProperty"`
///
/// # Returns
/// The element at the end of the path, or `None` if any step is missing
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use cashpoints_harvester::xml::find_by_path;
///
/// let xml = r#"<Country><AdministrativeArea><AdministrativeAreaName>Тверская область</AdministrativeAreaName></AdministrativeArea></Country>"#;
/// let doc = Document::parse(xml).unwrap();
/// let name = find_by_path(doc.root_element(), "AdministrativeArea/AdministrativeAreaName");
/// assert_eq!(name.unwrap().text(), Some("Тверская область"));
/// ```
pub fn find_by_path<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Option<Node<'a, 'input>> {
    path.split('/')
        .try_fold(node, |current, part| find_child(current, part))
}

/// Trimmed text content of a node, or an empty string.
pub fn get_text(node: Node<'_, '_>) -> String {
    node.text()
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
