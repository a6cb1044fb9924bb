pub const TNS_NS: &str = "http://www.apis-it.hr/fin/2012/types/f73";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SCHEMA_LOCATION: &str =
    "http://www.apis-it.hr/fin/2012/types/f73 FiskalizacijaSchema.xsd";
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub(crate) const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub const EXC_C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const RSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const SHA256_DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

pub(crate) const DATE_TIME_FORMAT: &str = "%d.%m.%YT%H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%d.%m.%Y";
