//! Canned Autodesk Platform Services payloads
#![allow(dead_code)]

use serde_json::{json, Value};

pub const OBJECT_URN: &str = "urn:adsk.objects:os.object:cad-uploads/tower.rvt";
pub const IFC_URN: &str = "urn:adsk.viewing:fs.file:dXJu/output/tower.ifc";

pub fn token_response(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Manifest before the IFC derivative has been registered.
pub fn manifest_pending() -> Value {
    json!({
        "type": "manifest",
        "hasThumbnail": "false",
        "status": "pending",
        "progress": "0% complete",
        "region": "US",
        "derivatives": []
    })
}

pub fn manifest_inprogress(ifc_progress: &str) -> Value {
    json!({
        "type": "manifest",
        "status": "inprogress",
        "progress": "25% complete",
        "region": "US",
        "derivatives": [
            {
                "outputType": "svf2",
                "status": "inprogress",
                "progress": "40% complete",
                "children": []
            },
            {
                "outputType": "ifc",
                "status": "inprogress",
                "progress": ifc_progress,
                "children": []
            }
        ]
    })
}

pub fn manifest_success() -> Value {
    json!({
        "type": "manifest",
        "status": "success",
        "progress": "complete",
        "region": "US",
        "derivatives": [
            {
                "outputType": "svf2",
                "status": "success",
                "progress": "complete",
                "children": [{ "role": "graphics", "mime": "application/autodesk-svf2" }]
            },
            {
                "outputType": "ifc",
                "status": "success",
                "progress": "complete",
                "children": [
                    { "role": "ifc", "urn": IFC_URN, "mime": "application/octet-stream" }
                ]
            }
        ]
    })
}

pub fn job_accepted(encoded_urn: &str) -> Value {
    json!({
        "result": "created",
        "urn": encoded_urn,
        "acceptedJobs": { "output": { "formats": [{ "type": "ifc" }, { "type": "svf2" }] } }
    })
}
