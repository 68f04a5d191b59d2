/// Split an operator supplied attribute string such as `"cn dn"` into the
/// attribute names requested by the search phase.
///
/// Names are separated by runs of space characters; order and duplicates are
/// kept. A blank string yields an empty list, which LDAP servers treat as a
/// request for all user attributes.
pub fn parse_attributes_list(attributes: &str) -> Vec<String> {
    attributes
        .split(' ')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
